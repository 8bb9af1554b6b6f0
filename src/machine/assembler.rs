//! Assembly parser for the compact instruction syntax.
//!
//! Converts source text into a [`Program`]. A program that fails to parse is
//! rejected whole: the scheduler never sees a partially decoded instruction
//! stream.
//!
//! # Syntax
//!
//! Whitespace is insignificant everywhere; instructions simply follow one
//! another.
//!
//! ```text
//! c DST SRC       copy SRC into DST
//! bO DST A B      DST = A O B, with O one of + - * / & | %
//! uO DST SRC      DST = O SRC, with O one of + - ! ~  (+ is absolute value)
//! jz OFF          jump by OFF instructions if the Zero flag is set
//! jn OFF          ... if the Negative flag is set
//! jp OFF          ... if the Positive flag is set
//! ju OFF          ... unconditionally (OFF may be negative)
//! s N             request syscall N
//! ```
//!
//! Locations:
//!
//! - `rNN` — register NN (decimal)
//! - `mAAAA` — memory at address AAAA (hex)
//! - `iNN` — memory at the address held in register NN (decimal)
//! - `vNN` — the immediate value NN (signed decimal)
//!
//! The historical `j`, `I`, and `J` addressing prefixes (indirect-with-offset
//! and memory-indirect modes) are not part of the instruction set and are
//! rejected with a [`ParseError`] naming them.
//!
//! Out-of-range register numbers and addresses parse fine on purpose: range
//! checking belongs to the operand resolver, which faults at execution time.

use crate::machine::errors::ParseError;
use crate::machine::isa::{BinaryOp, Instruction, Location, UnaryOp};
use crate::machine::program::Program;

/// Parses source text into a program.
///
/// Returns the position and reason of the first offending input on failure.
pub fn parse_program(source: &str) -> Result<Program, ParseError> {
    let mut scanner = Scanner::new(source);
    let mut instructions = Vec::new();
    while let Some(instruction) = scanner.parse_instruction()? {
        instructions.push(instruction);
    }
    Ok(Program::new(instructions))
}

/// Byte-position scanner over the source text.
struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            bytes: source.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.pos += 1;
        Some(byte)
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\r' | b'\n')) {
            self.pos += 1;
        }
    }

    fn error_at(&self, position: usize, reason: impl Into<String>) -> ParseError {
        ParseError::new(position, reason)
    }

    /// Parses the next instruction, or `None` at end of input.
    fn parse_instruction(&mut self) -> Result<Option<Instruction>, ParseError> {
        self.skip_spaces();
        let at = self.pos;
        let Some(byte) = self.bump() else {
            return Ok(None);
        };
        let instruction = match byte {
            b'c' => {
                let dst = self.parse_location()?;
                let src = self.parse_location()?;
                Instruction::Copy { dst, src }
            }
            b'b' => {
                let op = self.parse_operator(BinaryOp::from_symbol, "binary")?;
                let dst = self.parse_location()?;
                let src1 = self.parse_location()?;
                let src2 = self.parse_location()?;
                Instruction::Binary {
                    op,
                    dst,
                    src1,
                    src2,
                }
            }
            b'u' => {
                let op = self.parse_operator(UnaryOp::from_symbol, "unary")?;
                let dst = self.parse_location()?;
                let src = self.parse_location()?;
                Instruction::Unary { op, dst, src }
            }
            b'j' => {
                let cond_at = self.pos;
                let cond = self
                    .bump()
                    .ok_or_else(|| self.error_at(cond_at, "expected a jump condition"))?;
                let offset = self.parse_decimal()?;
                match cond {
                    b'z' | b'Z' => Instruction::JumpIfZero { offset },
                    b'n' | b'N' => Instruction::JumpIfNegative { offset },
                    b'p' | b'P' => Instruction::JumpIfPositive { offset },
                    b'u' | b'U' => Instruction::Jump { offset },
                    other => {
                        return Err(self.error_at(
                            cond_at,
                            format!("unknown jump condition '{}'", other as char),
                        ));
                    }
                }
            }
            b's' => Instruction::Syscall {
                number: self.parse_decimal()?,
            },
            other => {
                return Err(
                    self.error_at(at, format!("unknown instruction '{}'", other as char))
                );
            }
        };
        Ok(Some(instruction))
    }

    /// Parses a binary/unary operator symbol via the given lookup.
    fn parse_operator<T>(
        &mut self,
        lookup: impl Fn(char) -> Option<T>,
        kind: &str,
    ) -> Result<T, ParseError> {
        self.skip_spaces();
        let at = self.pos;
        let symbol = self
            .bump()
            .ok_or_else(|| self.error_at(at, format!("expected a {kind} operator")))?;
        lookup(symbol as char).ok_or_else(|| {
            self.error_at(
                at,
                format!("unknown {kind} operator '{}'", symbol as char),
            )
        })
    }

    fn parse_location(&mut self) -> Result<Location, ParseError> {
        self.skip_spaces();
        let at = self.pos;
        let Some(prefix) = self.bump() else {
            return Err(self.error_at(at, "expected a location"));
        };
        match prefix {
            b'r' => Ok(Location::Register(self.parse_decimal()?)),
            b'm' => Ok(Location::Memory(self.parse_hex()?)),
            b'i' => Ok(Location::RegisterIndirect(self.parse_decimal()?)),
            b'v' => Ok(Location::Immediate(self.parse_decimal()?)),
            b'j' | b'I' | b'J' => Err(self.error_at(
                at,
                format!("addressing mode '{}' is not implemented", prefix as char),
            )),
            other => Err(self.error_at(
                at,
                format!("unknown location prefix '{}'", other as char),
            )),
        }
    }

    /// Parses an optionally negative decimal number.
    fn parse_decimal(&mut self) -> Result<i64, ParseError> {
        self.skip_spaces();
        let at = self.pos;
        let negative = self.peek() == Some(b'-');
        if negative {
            self.pos += 1;
        }
        let digits_at = self.pos;
        let mut value: i64 = 0;
        while let Some(byte) = self.peek().filter(u8::is_ascii_digit) {
            let digit = i64::from(byte - b'0');
            value = value
                .checked_mul(10)
                .and_then(|v| {
                    if negative {
                        v.checked_sub(digit)
                    } else {
                        v.checked_add(digit)
                    }
                })
                .ok_or_else(|| self.error_at(at, "number out of range"))?;
            self.pos += 1;
        }
        if self.pos == digits_at {
            return Err(self.error_at(at, "expected a number"));
        }
        Ok(value)
    }

    /// Parses a non-negative hex number (no `0x` prefix, either case).
    fn parse_hex(&mut self) -> Result<i64, ParseError> {
        self.skip_spaces();
        let at = self.pos;
        let mut value: i64 = 0;
        while let Some(digit) = self.peek().and_then(|b| (b as char).to_digit(16)) {
            value = value
                .checked_mul(16)
                .and_then(|v| v.checked_add(i64::from(digit)))
                .ok_or_else(|| self.error_at(at, "number out of range"))?;
            self.pos += 1;
        }
        if self.pos == at {
            return Err(self.error_at(at, "expected a hex number"));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc_reg(index: i64) -> Location {
        Location::Register(index)
    }

    #[test]
    fn parses_every_instruction_form() {
        let program = parse_program("cr4v10 b+r4r4v1 u-r4r4 jz 2 jn -1 jp 0 ju 1 s3").unwrap();
        assert_eq!(program.len(), 8);
        assert_eq!(
            program.get(0),
            Some(&Instruction::Copy {
                dst: loc_reg(4),
                src: Location::Immediate(10),
            })
        );
        assert_eq!(
            program.get(1),
            Some(&Instruction::Binary {
                op: BinaryOp::Add,
                dst: loc_reg(4),
                src1: loc_reg(4),
                src2: Location::Immediate(1),
            })
        );
        assert_eq!(
            program.get(2),
            Some(&Instruction::Unary {
                op: UnaryOp::Neg,
                dst: loc_reg(4),
                src: loc_reg(4),
            })
        );
        assert_eq!(program.get(3), Some(&Instruction::JumpIfZero { offset: 2 }));
        assert_eq!(
            program.get(4),
            Some(&Instruction::JumpIfNegative { offset: -1 })
        );
        assert_eq!(
            program.get(5),
            Some(&Instruction::JumpIfPositive { offset: 0 })
        );
        assert_eq!(program.get(6), Some(&Instruction::Jump { offset: 1 }));
        assert_eq!(program.get(7), Some(&Instruction::Syscall { number: 3 }));
    }

    #[test]
    fn parses_dense_legacy_text() {
        // Historical smoke-test input: no separators at all.
        let program = parse_program(" cr4mBEEFs75b-r3r4r7cr4r5u-r1r1").unwrap();
        assert_eq!(program.len(), 5);
        assert_eq!(
            program.get(0),
            Some(&Instruction::Copy {
                dst: loc_reg(4),
                src: Location::Memory(0xBEEF),
            })
        );
        assert_eq!(program.get(1), Some(&Instruction::Syscall { number: 75 }));
        assert_eq!(
            program.get(2),
            Some(&Instruction::Binary {
                op: BinaryOp::Sub,
                dst: loc_reg(3),
                src1: loc_reg(4),
                src2: loc_reg(7),
            })
        );
    }

    #[test]
    fn memory_addresses_are_hex() {
        let program = parse_program("cm64v7").unwrap();
        assert_eq!(
            program.get(0),
            Some(&Instruction::Copy {
                dst: Location::Memory(0x64),
                src: Location::Immediate(7),
            })
        );
    }

    #[test]
    fn uppercase_jump_conditions() {
        let program = parse_program("jZ 1 jU -1").unwrap();
        assert_eq!(program.get(0), Some(&Instruction::JumpIfZero { offset: 1 }));
        assert_eq!(program.get(1), Some(&Instruction::Jump { offset: -1 }));
    }

    #[test]
    fn empty_source_is_an_empty_program() {
        assert!(parse_program("").unwrap().is_empty());
        assert!(parse_program("  \n\t ").unwrap().is_empty());
    }

    #[test]
    fn unknown_instruction_reports_position() {
        let err = parse_program("cr1v1 x").unwrap_err();
        assert_eq!(err.position, 6);
        assert_eq!(err.reason, "unknown instruction 'x'");
    }

    #[test]
    fn unimplemented_addressing_modes_are_rejected() {
        for source in ["cI44r1", "cJ44r1", "cr1j2"] {
            let err = parse_program(source).unwrap_err();
            assert!(err.reason.contains("not implemented"), "{source}: {err}");
        }
    }

    #[test]
    fn unknown_jump_condition() {
        let err = parse_program("jq 3").unwrap_err();
        assert_eq!(err.reason, "unknown jump condition 'q'");
    }

    #[test]
    fn unknown_binary_operator() {
        let err = parse_program("b^r1r1r1").unwrap_err();
        assert_eq!(err.reason, "unknown binary operator '^'");
    }

    #[test]
    fn missing_number_is_an_error() {
        let err = parse_program("cr").unwrap_err();
        assert_eq!(err.reason, "expected a number");
        let err = parse_program("ju").unwrap_err();
        assert_eq!(err.reason, "expected a number");
    }

    #[test]
    fn out_of_range_register_numbers_parse() {
        // Range checking is the operand resolver's job, at execution time.
        let program = parse_program("cr99v1").unwrap();
        assert_eq!(
            program.get(0),
            Some(&Instruction::Copy {
                dst: loc_reg(99),
                src: Location::Immediate(1),
            })
        );
    }
}
