use crate::value::Value;

const OP_CONSTANT: u8 = 1;
const OP_NIL: u8 = 2;
const OP_TRUE: u8 = 3;
const OP_FALSE: u8 = 4;
const OP_POP: u8 = 5;
const OP_GET_LOCAL: u8 = 6;
const OP_SET_LOCAL: u8 = 7;
const OP_GET_UPVALUE: u8 = 8;
const OP_SET_UPVALUE: u8 = 9;
const OP_GET_GLOBAL: u8 = 10;
const OP_DEFINE_GLOBAL: u8 = 11;
const OP_SET_GLOBAL: u8 = 12;
const OP_GET_PROPERTY: u8 = 13;
const OP_SET_PROPERTY: u8 = 14;
const OP_GET_SUPER: u8 = 15;
const OP_EQUAL: u8 = 16;
const OP_NOT_EQUAL: u8 = 17;
const OP_GREATER: u8 = 18;
const OP_GREATER_EQUAL: u8 = 19;
const OP_LESS: u8 = 20;
const OP_LESS_EQUAL: u8 = 21;
const OP_ADD: u8 = 22;
const OP_SUBTRACT: u8 = 23;
const OP_MULTIPLY: u8 = 24;
const OP_DIVIDE: u8 = 25;
const OP_NOT: u8 = 26;
const OP_NEGATE: u8 = 27;
const OP_JUMP: u8 = 28;
const OP_JUMP_IF_FALSE: u8 = 29;
const OP_LOOP: u8 = 30;
const OP_CALL: u8 = 31;
const OP_INVOKE: u8 = 32;
const OP_SUPER_INVOKE: u8 = 33;
const OP_CLOSURE: u8 = 34;
const OP_CLOSE_UPVALUE: u8 = 35;
const OP_RETURN: u8 = 36;
const OP_CLASS: u8 = 37;
const OP_INHERIT: u8 = 38;
const OP_METHOD: u8 = 39;
const OP_ARRAY_NEW: u8 = 40;
const OP_TABLE_NEW: u8 = 41;
const OP_GET: u8 = 42;
const OP_SET: u8 = 43;
const OP_GET_NOPOP: u8 = 44;
const OP_SET_NOPOP: u8 = 45;
const OP_INVALID: u8 = u8::MAX;

/// One capture directive trailing an `OpClosure`: where the runtime finds
/// the variable being closed over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpvalCapture {
    pub is_local: bool,
    pub index: u8,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    OpConstant(u8),
    OpNil,
    OpTrue,
    OpFalse,
    OpPop,
    OpGetLocal(u8),
    OpSetLocal(u8),
    OpGetUpvalue(u8),
    OpSetUpvalue(u8),
    OpGetGlobal(u8),
    OpDefineGlobal(u8),
    OpSetGlobal(u8),
    OpGetProperty(u8),
    OpSetProperty(u8),
    OpGetSuper(u8),
    OpEqual,
    OpNotEqual,
    OpGreater,
    OpGreaterEqual,
    OpLess,
    OpLessEqual,
    OpAdd,
    OpSubtract,
    OpMultiply,
    OpDivide,
    OpNot,
    OpNegate,
    OpJump(u16),
    OpJumpIfFalse(u16),
    OpLoop(u16),
    OpCall(u8),
    OpInvoke(u8, u8),
    OpSuperInvoke(u8, u8),
    OpClosure(u8, Vec<UpvalCapture>),
    OpCloseUpvalue,
    OpReturn,
    OpClass(u8),
    OpInherit,
    OpMethod(u8),
    OpArrayNew(u16),
    OpTableNew,
    OpGet,
    OpSet,
    OpGetNoPop,
    OpSetNoPop,
    OpInvalid,
}

// 16-bit operands are big-endian: high byte first.
impl From<Instruction> for Vec<u8> {
    fn from(instr: Instruction) -> Self {
        match instr {
            Instruction::OpConstant(offset) => vec![OP_CONSTANT, offset],
            Instruction::OpNil => vec![OP_NIL],
            Instruction::OpTrue => vec![OP_TRUE],
            Instruction::OpFalse => vec![OP_FALSE],
            Instruction::OpPop => vec![OP_POP],
            Instruction::OpGetLocal(slot) => vec![OP_GET_LOCAL, slot],
            Instruction::OpSetLocal(slot) => vec![OP_SET_LOCAL, slot],
            Instruction::OpGetUpvalue(slot) => vec![OP_GET_UPVALUE, slot],
            Instruction::OpSetUpvalue(slot) => vec![OP_SET_UPVALUE, slot],
            Instruction::OpGetGlobal(offset) => vec![OP_GET_GLOBAL, offset],
            Instruction::OpDefineGlobal(offset) => vec![OP_DEFINE_GLOBAL, offset],
            Instruction::OpSetGlobal(offset) => vec![OP_SET_GLOBAL, offset],
            Instruction::OpGetProperty(offset) => vec![OP_GET_PROPERTY, offset],
            Instruction::OpSetProperty(offset) => vec![OP_SET_PROPERTY, offset],
            Instruction::OpGetSuper(offset) => vec![OP_GET_SUPER, offset],
            Instruction::OpEqual => vec![OP_EQUAL],
            Instruction::OpNotEqual => vec![OP_NOT_EQUAL],
            Instruction::OpGreater => vec![OP_GREATER],
            Instruction::OpGreaterEqual => vec![OP_GREATER_EQUAL],
            Instruction::OpLess => vec![OP_LESS],
            Instruction::OpLessEqual => vec![OP_LESS_EQUAL],
            Instruction::OpAdd => vec![OP_ADD],
            Instruction::OpSubtract => vec![OP_SUBTRACT],
            Instruction::OpMultiply => vec![OP_MULTIPLY],
            Instruction::OpDivide => vec![OP_DIVIDE],
            Instruction::OpNot => vec![OP_NOT],
            Instruction::OpNegate => vec![OP_NEGATE],
            Instruction::OpJump(offset) => encode_u16(OP_JUMP, offset),
            Instruction::OpJumpIfFalse(offset) => encode_u16(OP_JUMP_IF_FALSE, offset),
            Instruction::OpLoop(offset) => encode_u16(OP_LOOP, offset),
            Instruction::OpCall(args) => vec![OP_CALL, args],
            Instruction::OpInvoke(name, args) => vec![OP_INVOKE, name, args],
            Instruction::OpSuperInvoke(name, args) => vec![OP_SUPER_INVOKE, name, args],
            Instruction::OpClosure(offset, captures) => {
                let mut bytes = vec![OP_CLOSURE, offset];
                for capture in captures {
                    bytes.push(capture.is_local as u8);
                    bytes.push(capture.index);
                }
                bytes
            }
            Instruction::OpCloseUpvalue => vec![OP_CLOSE_UPVALUE],
            Instruction::OpReturn => vec![OP_RETURN],
            Instruction::OpClass(offset) => vec![OP_CLASS, offset],
            Instruction::OpInherit => vec![OP_INHERIT],
            Instruction::OpMethod(offset) => vec![OP_METHOD, offset],
            Instruction::OpArrayNew(count) => encode_u16(OP_ARRAY_NEW, count),
            Instruction::OpTableNew => vec![OP_TABLE_NEW],
            Instruction::OpGet => vec![OP_GET],
            Instruction::OpSet => vec![OP_SET],
            Instruction::OpGetNoPop => vec![OP_GET_NOPOP],
            Instruction::OpSetNoPop => vec![OP_SET_NOPOP],
            Instruction::OpInvalid => vec![OP_INVALID],
        }
    }
}

fn encode_u16(opcode: u8, operand: u16) -> Vec<u8> {
    vec![opcode, (operand >> 8) as u8, operand as u8]
}

pub struct Chunk {
    code: Vec<u8>,
    lines: Vec<u32>,
    constants: Vec<Value>,
}

impl Chunk {
    pub fn new() -> Self {
        Chunk {
            code: Vec::new(),
            lines: Vec::new(),
            constants: Vec::new(),
        }
    }

    /// Appends an instruction, tagging every emitted byte with `line`, and
    /// returns the offset the instruction starts at.
    pub fn push_instruction(&mut self, instr: Instruction, line: u32) -> usize {
        let at = self.code.len();
        let bytes: Vec<u8> = instr.into();
        for byte in bytes {
            self.code.push(byte);
            self.lines.push(line);
        }
        at
    }

    pub fn push_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Rewrites the 16-bit operand of the jump or array-new instruction
    /// starting at `instr_offset`.
    pub fn patch_u16_operand(&mut self, instr_offset: usize, operand: u16) {
        self.code[instr_offset + 1] = (operand >> 8) as u8;
        self.code[instr_offset + 2] = operand as u8;
    }

    pub fn code_len(&self) -> usize {
        self.code.len()
    }

    pub fn line_at(&self, offset: usize) -> u32 {
        self.lines[offset]
    }

    pub fn get_constant(&self, index: u8) -> &Value {
        &self.constants[index as usize]
    }

    pub fn get_constant_checked(&self, index: u8) -> Option<&Value> {
        self.constants.get(index as usize)
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    fn byte_at(&self, offset: usize) -> Option<u8> {
        self.code.get(offset).copied()
    }

    fn u16_at(&self, offset: usize) -> Option<u16> {
        let high = self.byte_at(offset)?;
        let low = self.byte_at(offset + 1)?;
        Some(((high as u16) << 8) | low as u16)
    }

    /// Decodes the instruction at `offset`, returning its total encoded
    /// width alongside it. Truncated or unknown encodings decode to
    /// `OpInvalid`.
    pub fn read_instruction(&self, offset: usize) -> (usize, Instruction) {
        let opcode = match self.byte_at(offset) {
            Some(b) => b,
            None => return (1, Instruction::OpInvalid),
        };

        macro_rules! with_byte {
            ($variant:ident) => {
                match self.byte_at(offset + 1) {
                    Some(b) => (2, Instruction::$variant(b)),
                    None => (1, Instruction::OpInvalid),
                }
            };
        }
        macro_rules! with_u16 {
            ($variant:ident) => {
                match self.u16_at(offset + 1) {
                    Some(v) => (3, Instruction::$variant(v)),
                    None => (1, Instruction::OpInvalid),
                }
            };
        }

        match opcode {
            OP_CONSTANT => with_byte!(OpConstant),
            OP_NIL => (1, Instruction::OpNil),
            OP_TRUE => (1, Instruction::OpTrue),
            OP_FALSE => (1, Instruction::OpFalse),
            OP_POP => (1, Instruction::OpPop),
            OP_GET_LOCAL => with_byte!(OpGetLocal),
            OP_SET_LOCAL => with_byte!(OpSetLocal),
            OP_GET_UPVALUE => with_byte!(OpGetUpvalue),
            OP_SET_UPVALUE => with_byte!(OpSetUpvalue),
            OP_GET_GLOBAL => with_byte!(OpGetGlobal),
            OP_DEFINE_GLOBAL => with_byte!(OpDefineGlobal),
            OP_SET_GLOBAL => with_byte!(OpSetGlobal),
            OP_GET_PROPERTY => with_byte!(OpGetProperty),
            OP_SET_PROPERTY => with_byte!(OpSetProperty),
            OP_GET_SUPER => with_byte!(OpGetSuper),
            OP_EQUAL => (1, Instruction::OpEqual),
            OP_NOT_EQUAL => (1, Instruction::OpNotEqual),
            OP_GREATER => (1, Instruction::OpGreater),
            OP_GREATER_EQUAL => (1, Instruction::OpGreaterEqual),
            OP_LESS => (1, Instruction::OpLess),
            OP_LESS_EQUAL => (1, Instruction::OpLessEqual),
            OP_ADD => (1, Instruction::OpAdd),
            OP_SUBTRACT => (1, Instruction::OpSubtract),
            OP_MULTIPLY => (1, Instruction::OpMultiply),
            OP_DIVIDE => (1, Instruction::OpDivide),
            OP_NOT => (1, Instruction::OpNot),
            OP_NEGATE => (1, Instruction::OpNegate),
            OP_JUMP => with_u16!(OpJump),
            OP_JUMP_IF_FALSE => with_u16!(OpJumpIfFalse),
            OP_LOOP => with_u16!(OpLoop),
            OP_CALL => with_byte!(OpCall),
            OP_INVOKE => match (self.byte_at(offset + 1), self.byte_at(offset + 2)) {
                (Some(name), Some(args)) => (3, Instruction::OpInvoke(name, args)),
                _ => (1, Instruction::OpInvalid),
            },
            OP_SUPER_INVOKE => match (self.byte_at(offset + 1), self.byte_at(offset + 2)) {
                (Some(name), Some(args)) => (3, Instruction::OpSuperInvoke(name, args)),
                _ => (1, Instruction::OpInvalid),
            },
            OP_CLOSURE => self.read_closure(offset),
            OP_CLOSE_UPVALUE => (1, Instruction::OpCloseUpvalue),
            OP_RETURN => (1, Instruction::OpReturn),
            OP_CLASS => with_byte!(OpClass),
            OP_INHERIT => (1, Instruction::OpInherit),
            OP_METHOD => with_byte!(OpMethod),
            OP_ARRAY_NEW => with_u16!(OpArrayNew),
            OP_TABLE_NEW => (1, Instruction::OpTableNew),
            OP_GET => (1, Instruction::OpGet),
            OP_SET => (1, Instruction::OpSet),
            OP_GET_NOPOP => (1, Instruction::OpGetNoPop),
            OP_SET_NOPOP => (1, Instruction::OpSetNoPop),
            _ => (1, Instruction::OpInvalid),
        }
    }

    // The capture directives trailing an OpClosure have no self-describing
    // length; the referenced function constant declares how many follow.
    fn read_closure(&self, offset: usize) -> (usize, Instruction) {
        let const_index = match self.byte_at(offset + 1) {
            Some(b) => b,
            None => return (1, Instruction::OpInvalid),
        };
        let upvalue_count = match self.get_constant_checked(const_index) {
            Some(Value::Function(fn_obj)) => fn_obj.upvalue_count(),
            _ => return (1, Instruction::OpInvalid),
        };

        let mut captures = Vec::with_capacity(upvalue_count);
        for i in 0..upvalue_count {
            let at = offset + 2 + 2 * i;
            match (self.byte_at(at), self.byte_at(at + 1)) {
                (Some(is_local), Some(index)) => captures.push(UpvalCapture {
                    is_local: is_local != 0,
                    index,
                }),
                _ => return (1, Instruction::OpInvalid),
            }
        }
        (
            2 + 2 * upvalue_count,
            Instruction::OpClosure(const_index, captures),
        )
    }

    pub fn iter(&self) -> InstructionIter {
        InstructionIter {
            chunk: self,
            offset: 0,
        }
    }
}

impl Default for Chunk {
    fn default() -> Self {
        Chunk::new()
    }
}

/// Walks a chunk instruction by instruction, yielding each one with the
/// code offset it starts at.
pub struct InstructionIter<'a> {
    chunk: &'a Chunk,
    offset: usize,
}

impl<'a> Iterator for InstructionIter<'a> {
    type Item = (usize, Instruction);

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.chunk.code_len() {
            return None;
        }
        let at = self.offset;
        let (size, instr) = self.chunk.read_instruction(at);
        self.offset += size;
        Some((at, instr))
    }
}
