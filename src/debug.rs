use std::io::{self, Write};

use crate::chunk::{Chunk, Instruction, InstructionIter};

/// Renders one line per instruction, teaching the byte offsets and source
/// lines alongside the decoded operands.
pub struct Disassembler<'a> {
    chunk: &'a Chunk,
    iter: InstructionIter<'a>,
    prev_line: Option<u32>,
}

impl<'a> Disassembler<'a> {
    pub fn new(chunk: &'a Chunk) -> Self {
        Disassembler {
            iter: chunk.iter(),
            chunk,
            prev_line: None,
        }
    }
}

impl<'a> Iterator for Disassembler<'a> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        let (offset, instr) = self.iter.next()?;
        let line = self.chunk.line_at(offset);
        let line_str = if self.prev_line == Some(line) {
            format!("{:>4} ", "|")
        } else {
            format!("{:04} ", line)
        };
        self.prev_line = Some(line);
        Some(format!(
            "{:04} {}{}",
            offset,
            line_str,
            render_instruction(self.chunk, offset, &instr)
        ))
    }
}

pub fn disassemble_chunk(chunk: &Chunk, name: &str, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "== {} ==", name)?;
    for instr_str in Disassembler::new(chunk) {
        writeln!(out, "{}", instr_str)?;
    }
    Ok(())
}

/// Renders the single instruction at `offset`, for execution tracing.
pub fn render_at(chunk: &Chunk, offset: usize) -> String {
    let (_, instr) = chunk.read_instruction(offset);
    format!(
        "{:04} {:04} {}",
        offset,
        chunk.line_at(offset),
        render_instruction(chunk, offset, &instr)
    )
}

fn constant_str(chunk: &Chunk, const_index: u8) -> String {
    match chunk.get_constant_checked(const_index) {
        Some(val) => format!("'{}'", val),
        None => "<out-of-bound>".to_string(),
    }
}

fn render_instruction(chunk: &Chunk, offset: usize, instr: &Instruction) -> String {
    match instr {
        Instruction::OpConstant(ix) => {
            format!("{:<16} {:04} {}", "OP_CONSTANT", ix, constant_str(chunk, *ix))
        }
        Instruction::OpNil => "OP_NIL".to_string(),
        Instruction::OpTrue => "OP_TRUE".to_string(),
        Instruction::OpFalse => "OP_FALSE".to_string(),
        Instruction::OpPop => "OP_POP".to_string(),
        Instruction::OpGetLocal(slot) => format!("{:<16} {:04}", "OP_GET_LOCAL", slot),
        Instruction::OpSetLocal(slot) => format!("{:<16} {:04}", "OP_SET_LOCAL", slot),
        Instruction::OpGetUpvalue(slot) => format!("{:<16} {:04}", "OP_GET_UPVALUE", slot),
        Instruction::OpSetUpvalue(slot) => format!("{:<16} {:04}", "OP_SET_UPVALUE", slot),
        Instruction::OpGetGlobal(ix) => {
            format!("{:<16} {:04} {}", "OP_GET_GLOBAL", ix, constant_str(chunk, *ix))
        }
        Instruction::OpDefineGlobal(ix) => format!(
            "{:<16} {:04} {}",
            "OP_DEFINE_GLOBAL",
            ix,
            constant_str(chunk, *ix)
        ),
        Instruction::OpSetGlobal(ix) => {
            format!("{:<16} {:04} {}", "OP_SET_GLOBAL", ix, constant_str(chunk, *ix))
        }
        Instruction::OpGetProperty(ix) => format!(
            "{:<16} {:04} {}",
            "OP_GET_PROPERTY",
            ix,
            constant_str(chunk, *ix)
        ),
        Instruction::OpSetProperty(ix) => format!(
            "{:<16} {:04} {}",
            "OP_SET_PROPERTY",
            ix,
            constant_str(chunk, *ix)
        ),
        Instruction::OpGetSuper(ix) => {
            format!("{:<16} {:04} {}", "OP_GET_SUPER", ix, constant_str(chunk, *ix))
        }
        Instruction::OpEqual => "OP_EQUAL".to_string(),
        Instruction::OpNotEqual => "OP_NOT_EQUAL".to_string(),
        Instruction::OpGreater => "OP_GREATER".to_string(),
        Instruction::OpGreaterEqual => "OP_GREATER_EQUAL".to_string(),
        Instruction::OpLess => "OP_LESS".to_string(),
        Instruction::OpLessEqual => "OP_LESS_EQUAL".to_string(),
        Instruction::OpAdd => "OP_ADD".to_string(),
        Instruction::OpSubtract => "OP_SUBTRACT".to_string(),
        Instruction::OpMultiply => "OP_MULTIPLY".to_string(),
        Instruction::OpDivide => "OP_DIVIDE".to_string(),
        Instruction::OpNot => "OP_NOT".to_string(),
        Instruction::OpNegate => "OP_NEGATE".to_string(),
        Instruction::OpJump(jump) => format!(
            "{:<16} {:04} -> {:04}",
            "OP_JUMP",
            offset,
            offset + 3 + *jump as usize
        ),
        Instruction::OpJumpIfFalse(jump) => format!(
            "{:<16} {:04} -> {:04}",
            "OP_JUMP_IF_FALSE",
            offset,
            offset + 3 + *jump as usize
        ),
        Instruction::OpLoop(jump) => format!(
            "{:<16} {:04} -> {:04}",
            "OP_LOOP",
            offset,
            offset + 3 - *jump as usize
        ),
        Instruction::OpCall(args) => format!("{:<16} {:04}", "OP_CALL", args),
        Instruction::OpInvoke(ix, args) => format!(
            "{:<16} ({} args) {:04} {}",
            "OP_INVOKE",
            args,
            ix,
            constant_str(chunk, *ix)
        ),
        Instruction::OpSuperInvoke(ix, args) => format!(
            "{:<16} ({} args) {:04} {}",
            "OP_SUPER_INVOKE",
            args,
            ix,
            constant_str(chunk, *ix)
        ),
        Instruction::OpClosure(ix, captures) => {
            let mut result = format!(
                "{:<16} {:04} {}",
                "OP_CLOSURE",
                ix,
                constant_str(chunk, *ix)
            );
            for capture in captures {
                if capture.is_local {
                    result.push_str(&format!(" (local {})", capture.index));
                } else {
                    result.push_str(&format!(" (upvalue {})", capture.index));
                }
            }
            result
        }
        Instruction::OpCloseUpvalue => "OP_CLOSE_UPVALUE".to_string(),
        Instruction::OpReturn => "OP_RETURN".to_string(),
        Instruction::OpClass(ix) => {
            format!("{:<16} {:04} {}", "OP_CLASS", ix, constant_str(chunk, *ix))
        }
        Instruction::OpInherit => "OP_INHERIT".to_string(),
        Instruction::OpMethod(ix) => {
            format!("{:<16} {:04} {}", "OP_METHOD", ix, constant_str(chunk, *ix))
        }
        Instruction::OpArrayNew(count) => format!("{:<16} {:04}", "OP_ARRAY_NEW", count),
        Instruction::OpTableNew => "OP_TABLE_NEW".to_string(),
        Instruction::OpGet => "OP_GET".to_string(),
        Instruction::OpSet => "OP_SET".to_string(),
        Instruction::OpGetNoPop => "OP_GET_NOPOP".to_string(),
        Instruction::OpSetNoPop => "OP_SET_NOPOP".to_string(),
        Instruction::OpInvalid => "OP_INVALID".to_string(),
    }
}
