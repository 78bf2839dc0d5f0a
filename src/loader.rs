use std::convert::TryInto;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

use tracing::info;

use crate::error::{UmError, UmResult};

/// Read a UM program file: a sequence of 32-bit big-endian words, word N
/// occupying bytes `4N..4N+3` with byte `4N` most significant.
pub fn boot(path: &Path) -> UmResult<Vec<u32>> {
    let mut file = File::open(path)
        .map_err(|source| UmError::Io { path: path.to_path_buf(), source })?;

    let mut contents = Vec::new();
    file.read_to_end(&mut contents)
        .map_err(|source| UmError::Io { path: path.to_path_buf(), source })?;

    if contents.len() % 4 != 0 {
        return Err(UmError::MisalignedProgram {
            path: path.to_path_buf(),
            len: contents.len() as u64,
        });
    }

    let program: Vec<u32> = contents
        .chunks_exact(4)
        .map(|word| u32::from_be_bytes(word.try_into().unwrap()))
        .collect();

    info!(path = %path.display(), words = program.len(), "loaded program");
    Ok(program)
}
