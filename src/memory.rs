use std::collections::HashMap;

use tracing::{error, trace};

use crate::error::{UmError, UmResult};

const PROGRAM_SEGMENT: u32 = 0;

/// Segmented memory: a table of variable-length word segments addressed by
/// id, plus a free list of ids available for reuse.
///
/// `heap` only ever contains currently-mapped segments, and `next_id` is an
/// independent, monotonically increasing counter rather than a reuse of
/// `heap.len()`. That keeps mapped and free ids disjoint by construction: a
/// segment id is either mapped or free, never both and never neither,
/// without needing a convention to enforce it.
#[derive(Debug)]
pub struct Memory {
    heap: HashMap<u32, Vec<u32>>,
    free: Vec<u32>,
    next_id: u32,
}

impl Memory {
    /// Construct memory with the given program image installed as segment 0.
    pub fn new(program: Vec<u32>) -> Memory {
        let mut heap = HashMap::new();
        heap.insert(PROGRAM_SEGMENT, program);
        Memory { heap, free: Vec::new(), next_id: 1 }
    }

    /// Allocate a zero-filled segment of `length` words, returning its id.
    /// Reuses a free id if one is available, otherwise extends the table.
    pub fn map(&mut self, length: u32) -> u32 {
        let segment = vec![0u32; length as usize];
        let id = match self.free.pop() {
            Some(id) => id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                id
            }
        };
        trace!(id, length, "map");
        self.heap.insert(id, segment);
        id
    }

    /// Release the segment at `id`, making it available for reuse.
    pub fn unmap(&mut self, id: u32) -> UmResult<()> {
        if id == PROGRAM_SEGMENT {
            error!("attempted to unmap segment 0");
            return Err(UmError::UnmapSegmentZero);
        }
        if self.heap.remove(&id).is_none() {
            error!(id, "attempted to unmap a segment that isn't mapped");
            return Err(UmError::UnmapUnmapped(id));
        }
        trace!(id, "unmap");
        self.free.push(id);
        Ok(())
    }

    /// Bounds-checked read of one word.
    pub fn get(&self, seg: u32, offset: u32) -> UmResult<u32> {
        let segment = self.heap.get(&seg).ok_or(UmError::UnmappedSegment(seg))?;
        segment
            .get(offset as usize)
            .copied()
            .ok_or(UmError::OffsetOutOfBounds { seg, offset, len: segment.len() })
    }

    /// Bounds-checked write of one word.
    pub fn put(&mut self, seg: u32, offset: u32, value: u32) -> UmResult<()> {
        let len = self.heap.get(&seg).ok_or(UmError::UnmappedSegment(seg))?.len();
        if offset as usize >= len {
            return Err(UmError::OffsetOutOfBounds { seg, offset, len });
        }
        self.heap.get_mut(&seg).unwrap()[offset as usize] = value;
        Ok(())
    }

    /// Fetch the instruction word at the given program-counter offset into
    /// segment 0, without requiring a caller to look up segment 0 by hand.
    pub fn fetch(&self, pc: usize) -> UmResult<u32> {
        self.get(PROGRAM_SEGMENT, pc as u32)
    }

    /// Length (in words) of segment 0 — the bound the program counter must
    /// respect.
    pub fn program_len(&self) -> usize {
        self.heap.get(&PROGRAM_SEGMENT).map_or(0, Vec::len)
    }

    /// Replace segment 0 with a deep copy of segment `id`. `id` must not be
    /// 0 (the LOADP handler takes the zero-copy shortcut itself and never
    /// calls this in that case).
    pub fn replace_segment_zero(&mut self, id: u32) -> UmResult<()> {
        debug_assert_ne!(id, PROGRAM_SEGMENT);
        let copy = self.heap.get(&id).ok_or(UmError::UnmappedSegment(id))?.clone();
        trace!(id, len = copy.len(), "load-program: replacing segment 0");
        self.heap.insert(PROGRAM_SEGMENT, copy);
        Ok(())
    }
}
