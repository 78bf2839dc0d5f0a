use std::path::PathBuf;

use thiserror::Error;

/// Every way the machine can stop abnormally.
///
/// All variants are fatal. They're plain data rather than a panic, so the
/// interpreter can return them from `run` and callers (tests, `main`) decide
/// what to do with them.
#[derive(Debug, Error)]
pub enum UmError {
    #[error("could not read program file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("program file {path} is {len} bytes, not a multiple of 4")]
    MisalignedProgram { path: PathBuf, len: u64 },

    #[error("word {word:#010x} does not code for a valid instruction (opcode {opcode})")]
    InvalidOpcode { word: u32, opcode: u32 },

    #[error("segment {0} is not mapped")]
    UnmappedSegment(u32),

    #[error("offset {offset} is out of bounds for segment {seg} (length {len})")]
    OffsetOutOfBounds { seg: u32, offset: u32, len: usize },

    #[error("division by zero")]
    DivideByZero,

    #[error("cannot unmap segment 0")]
    UnmapSegmentZero,

    #[error("segment {0} is already unmapped")]
    UnmapUnmapped(u32),

    #[error("cannot output {0}: not a byte value (0-255)")]
    OutputOutOfRange(u32),

    #[error("failed to read from stdin: {0}")]
    InputFailed(#[source] std::io::Error),

    #[error("failed to write to stdout: {0}")]
    OutputFailed(#[source] std::io::Error),
}

pub type UmResult<T> = Result<T, UmError>;
