use crate::error::UmError;

/// The 14 opcodes, numbered to match the 4-bit opcode field they're decoded
/// from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    CMov = 0,
    Load = 1,
    Store = 2,
    Add = 3,
    Mul = 4,
    Div = 5,
    Nand = 6,
    Halt = 7,
    Map = 8,
    Unmap = 9,
    Output = 10,
    Input = 11,
    LoadProgram = 12,
    LoadValue = 13,
}

impl Opcode {
    fn from_u32(value: u32) -> Option<Opcode> {
        use Opcode::*;
        Some(match value {
            0 => CMov,
            1 => Load,
            2 => Store,
            3 => Add,
            4 => Mul,
            5 => Div,
            6 => Nand,
            7 => Halt,
            8 => Map,
            9 => Unmap,
            10 => Output,
            11 => Input,
            12 => LoadProgram,
            13 => LoadValue,
            _ => return None,
        })
    }
}

/// A decoded instruction word.
///
/// There are two wire formats (standard `(op, A, B, C)` and the load-value
/// `(op, A, immediate)` format) but only one ever needs to be live at a
/// time, so they're a two-variant enum rather than a struct with unused
/// fields for whichever format didn't apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    Standard { op: Opcode, a: usize, b: usize, c: usize },
    LoadValue { a: usize, value: u32 },
}

impl Instruction {
    /// Pure bit extraction, no allocation. 32-bit shifts and masks only —
    /// every field fits comfortably inside a `u32`, so there's no need to
    /// widen to `u64` anywhere in here.
    pub fn decode(word: u32) -> Result<Instruction, UmError> {
        let opcode_field = (word >> 28) & 0xf;
        let opcode = Opcode::from_u32(opcode_field)
            .ok_or(UmError::InvalidOpcode { word, opcode: opcode_field })?;

        if opcode == Opcode::LoadValue {
            let a = ((word >> 25) & 0x7) as usize;
            let value = word & 0x01ff_ffff;
            return Ok(Instruction::LoadValue { a, value });
        }

        let a = ((word >> 6) & 0x7) as usize;
        let b = ((word >> 3) & 0x7) as usize;
        let c = (word & 0x7) as usize;
        Ok(Instruction::Standard { op: opcode, a, b, c })
    }
}
