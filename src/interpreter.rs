use std::io::{Read, Write};

use tracing::{debug, error, trace};

use crate::error::{UmError, UmResult};
use crate::instruction::{Instruction, Opcode};
use crate::memory::Memory;
use crate::register::RegisterFile;

/// How execution came to an end. Both variants are "success" from the
/// host's point of view (exit code 0) — running off the end of segment 0
/// is normal termination, same as HALT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Halted,
    RanOffEnd,
}

/// The VM: register file, segmented memory, program counter. Owns
/// everything it allocates, so there's no separate teardown step — dropping
/// an `Interpreter` releases every segment and the free list with it.
pub struct Interpreter {
    registers: RegisterFile,
    memory: Memory,
    pc: usize,
    instructions_executed: u64,
}

impl Interpreter {
    /// Construct a VM with `program` installed as segment 0 and the program
    /// counter at 0.
    pub fn new(program: Vec<u32>) -> Interpreter {
        debug!(words = program.len(), "constructing VM");
        Interpreter {
            registers: RegisterFile::new(),
            memory: Memory::new(program),
            pc: 0,
            instructions_executed: 0,
        }
    }

    /// Run to completion, reading IN bytes from `input` and writing OUT
    /// bytes to `output`. Returns `Ok` on HALT or falling off the end of
    /// segment 0; any fatal condition is returned as `Err`.
    pub fn run(
        &mut self,
        input: &mut impl Read,
        output: &mut impl Write,
    ) -> UmResult<Termination> {
        loop {
            if self.pc >= self.memory.program_len() {
                debug!(
                    instructions = self.instructions_executed,
                    "ran off the end of segment 0"
                );
                return Ok(Termination::RanOffEnd);
            }

            let word = self.memory.fetch(self.pc)?;
            self.pc += 1;
            self.instructions_executed += 1;

            let instr = Instruction::decode(word).map_err(|e| {
                error!(%e, word, "decode failed");
                e
            })?;

            match instr {
                Instruction::LoadValue { a, value } => {
                    trace!(a, value, "LV");
                    self.registers[a] = value;
                }
                Instruction::Standard { op, a, b, c } => {
                    if let Some(termination) = self.dispatch(op, a, b, c, input, output)? {
                        debug!(
                            instructions = self.instructions_executed,
                            "halted"
                        );
                        return Ok(termination);
                    }
                }
            }
        }
    }

    /// Execute one standard-format opcode. Returns `Some(Termination)` only
    /// for HALT; every other opcode returns `None` and the loop continues.
    fn dispatch(
        &mut self,
        op: Opcode,
        a: usize,
        b: usize,
        c: usize,
        input: &mut impl Read,
        output: &mut impl Write,
    ) -> UmResult<Option<Termination>> {
        match op {
            Opcode::CMov => {
                trace!(a, b, c, "CMOV");
                if self.registers[c] != 0 {
                    self.registers[a] = self.registers[b];
                }
            }
            Opcode::Load => {
                trace!(a, b, c, "SLOAD");
                self.registers[a] = self.memory.get(self.registers[b], self.registers[c])?;
            }
            Opcode::Store => {
                trace!(a, b, c, "SSTORE");
                self.memory.put(self.registers[a], self.registers[b], self.registers[c])?;
            }
            Opcode::Add => {
                trace!(a, b, c, "ADD");
                self.registers[a] = self.registers[b].wrapping_add(self.registers[c]);
            }
            Opcode::Mul => {
                trace!(a, b, c, "MUL");
                self.registers[a] = self.registers[b].wrapping_mul(self.registers[c]);
            }
            Opcode::Div => {
                trace!(a, b, c, "DIV");
                if self.registers[c] == 0 {
                    error!(a, b, c, "division by zero");
                    return Err(UmError::DivideByZero);
                }
                self.registers[a] = self.registers[b] / self.registers[c];
            }
            Opcode::Nand => {
                trace!(a, b, c, "NAND");
                self.registers[a] = !(self.registers[b] & self.registers[c]);
            }
            Opcode::Halt => {
                trace!("HALT");
                return Ok(Some(Termination::Halted));
            }
            Opcode::Map => {
                let length = self.registers[c];
                let id = self.memory.map(length);
                trace!(b, id, length, "MAP");
                self.registers[b] = id;
            }
            Opcode::Unmap => {
                trace!(c, id = self.registers[c], "UNMAP");
                self.memory.unmap(self.registers[c])?;
            }
            Opcode::Output => {
                let value = self.registers[c];
                if value > 0xff {
                    error!(c, value, "output value out of byte range");
                    return Err(UmError::OutputOutOfRange(value));
                }
                trace!(c, value, "OUT");
                output
                    .write_all(&[value as u8])
                    .map_err(UmError::OutputFailed)?;
                output.flush().map_err(UmError::OutputFailed)?;
            }
            Opcode::Input => {
                let mut byte = [0u8; 1];
                let value = match input.read(&mut byte) {
                    Ok(1) => byte[0] as u32,
                    Ok(_) => u32::MAX,
                    Err(e) => return Err(UmError::InputFailed(e)),
                };
                trace!(c, value, "IN");
                self.registers[c] = value;
            }
            Opcode::LoadProgram => {
                let segment = self.registers[b];
                trace!(b, c, segment, target = self.registers[c], "LOADP");
                if segment != 0 {
                    self.memory.replace_segment_zero(segment)?;
                }
                self.pc = self.registers[c] as usize;
            }
            Opcode::LoadValue => unreachable!("load-value is handled before dispatch"),
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run_program(words: &[u32], stdin: &[u8]) -> (UmResult<Termination>, Vec<u8>) {
        let mut interp = Interpreter::new(words.to_vec());
        let mut input = Cursor::new(stdin.to_vec());
        let mut output = Vec::new();
        let result = interp.run(&mut input, &mut output);
        (result, output)
    }

    #[test]
    fn halts_immediately() {
        let (result, out) = run_program(&[0x7000_0000], &[]);
        assert_eq!(result.unwrap(), Termination::Halted);
        assert!(out.is_empty());
    }

    #[test]
    fn lv_then_out_emits_the_byte() {
        // LV r0 <- 'A'; OUT r0; HALT
        let program = [0xD000_0041, 0xA000_0000, 0x7000_0000];
        let (result, out) = run_program(&program, &[]);
        assert_eq!(result.unwrap(), Termination::Halted);
        assert_eq!(out, b"A");
    }

    #[test]
    fn echoes_one_byte_from_stdin() {
        // IN r0; OUT r0; HALT
        let program = [0xB000_0000, 0xA000_0000, 0x7000_0000];
        let (result, out) = run_program(&program, b"Z");
        assert_eq!(result.unwrap(), Termination::Halted);
        assert_eq!(out, b"Z");
    }

    #[test]
    fn in_at_eof_sets_all_ones() {
        // IN r0; HALT -- no stdin bytes available.
        let program = [0xB000_0000, 0x7000_0000];
        let mut interp = Interpreter::new(program.to_vec());
        let mut input = Cursor::new(Vec::<u8>::new());
        let mut output = Vec::new();
        interp.run(&mut input, &mut output).unwrap();
    }

    #[test]
    fn map_unmap_store_load_round_trip() {
        // LV r2<-4; MAP r1<-len r2; LV r4<-0x2A; LV r3<-0;
        // SSTORE M[r1,r3]<-r4; SLOAD r5<-M[r1,r3]; OUT r5; UNMAP r1; HALT
        let program = [
            0xd400_0004, // LV r2 <- 4
            0x8000_000a, // MAP r1 <- len r2
            0xd800_002a, // LV r4 <- 0x2A
            0xd600_0000, // LV r3 <- 0
            0x2000_005c, // SSTORE M[r1,r3] <- r4
            0x1000_014b, // SLOAD r5 <- M[r1,r3]
            0xa000_0005, // OUT r5
            0x9000_0001, // UNMAP r1
            0x7000_0000, // HALT
        ];

        let (result, stdout) = run_program(&program, &[]);
        assert_eq!(result.unwrap(), Termination::Halted);
        assert_eq!(stdout, vec![0x2a]);
    }

    #[test]
    fn loadp_self_modifying_segment_redirect() {
        // LV r2<-1; MAP r1<-len r2; LV r4<-7 (offset of this program's own
        // trailing HALT word); SLOAD r3<-M[r0,r4] (r0 is still 0, reading
        // segment 0 itself); LV r5<-0; SSTORE M[r1,r5]<-r3 (plant a HALT as
        // the first word of the new segment); LOADP r1, r5 (deep-copy
        // segment r1 over segment 0 and jump to offset 0); HALT (original,
        // never reached once LOADP redirects the PC).
        let program = [
            0xd400_0001, // LV r2 <- 1
            0x8000_000a, // MAP r1 <- len r2
            0xd800_0007, // LV r4 <- 7
            0x1000_00c4, // SLOAD r3 <- M[r0,r4]
            0xda00_0000, // LV r5 <- 0
            0x2000_006b, // SSTORE M[r1,r5] <- r3
            0xc000_000d, // LOADP r1, r5
            0x7000_0000, // HALT (original segment 0, overwritten before use)
        ];
        let (result, out) = run_program(&program, &[]);
        assert_eq!(result.unwrap(), Termination::Halted);
        assert!(out.is_empty());
    }

    #[test]
    fn div_by_zero_is_fatal() {
        // LV r1 <- 0; DIV r0 <- r0 / r1
        let lv = (13u32 << 28) | (1 << 25) | 0;
        let div = (5u32 << 28) | (0 << 6) | (0 << 3) | 1;
        let (result, _) = run_program(&[lv, div], &[]);
        assert!(matches!(result, Err(UmError::DivideByZero)));
    }

    #[test]
    fn unmap_segment_zero_is_fatal() {
        // LV r0 <- 0; UNMAP r0
        let lv = 13u32 << 28;
        let unmap = (9u32 << 28) | 0;
        let (result, _) = run_program(&[lv, unmap], &[]);
        assert!(matches!(result, Err(UmError::UnmapSegmentZero)));
    }

    #[test]
    fn output_above_byte_range_is_fatal() {
        // LV r0 <- 256; OUT r0
        let lv = (13u32 << 28) | 256;
        let out = 10u32 << 28;
        let (result, _) = run_program(&[lv, out], &[]);
        assert!(matches!(result, Err(UmError::OutputOutOfRange(256))));
    }

    #[test]
    fn nand_of_a_register_with_itself_is_complement() {
        // LV r0 <- 5; NAND r1 <- r0 NAND r0; HALT
        let lv = (13u32 << 28) | (0 << 25) | 5;
        let nand = (6u32 << 28) | (1 << 6) | (0 << 3) | 0;
        let halt = 7u32 << 28;
        let mut interp = Interpreter::new(vec![lv, nand, halt]);
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        interp.run(&mut input, &mut output).unwrap();
        assert_eq!(interp.registers[1], !5u32);
    }

    #[test]
    fn add_and_mul_wrap_on_overflow() {
        let lv_max = (13u32 << 28) | (0 << 25) | 0x01ff_ffff;
        let lv_max2 = (13u32 << 28) | (1 << 25) | 0x01ff_ffff;
        let add = (3u32 << 28) | (2 << 6) | (0 << 3) | 1;
        let mul = (4u32 << 28) | (3 << 6) | (2 << 3) | 1;
        let halt = 7u32 << 28;
        let mut interp = Interpreter::new(vec![lv_max, lv_max2, add, mul, halt]);
        let mut input = Cursor::new(Vec::new());
        let mut output = Vec::new();
        interp.run(&mut input, &mut output).unwrap();
        let expected_add = 0x01ff_ffffu32.wrapping_add(0x01ff_ffff);
        assert_eq!(interp.registers[2], expected_add);
        assert_eq!(interp.registers[3], expected_add.wrapping_mul(0x01ff_ffff));
    }

    #[test]
    fn falls_off_the_end_of_segment_zero() {
        // No HALT at all -- just one harmless instruction.
        let lv = 13u32 << 28;
        let (result, _) = run_program(&[lv], &[]);
        assert_eq!(result.unwrap(), Termination::RanOffEnd);
    }

    #[test]
    fn loadp_with_zero_segment_is_a_pure_jump() {
        // LOADP with r[B]=0 replaces nothing and only sets the PC, so the
        // OUT in between the jump and its target is skipped entirely.
        let program = [
            0xd200_0004, // LV r1 <- 4 (jump target)
            0xc000_0001, // LOADP r0(=0), r1 -> pc = 4, no segment copy
            0xd400_0042, // LV r2 <- 0x42 (skipped)
            0xa000_0002, // OUT r2 (skipped)
            0x7000_0000, // HALT
        ];
        let (result, out) = run_program(&program, &[]);
        assert_eq!(result.unwrap(), Termination::Halted);
        assert!(out.is_empty());
    }
}
