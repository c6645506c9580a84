use tuff::chunk::{Chunk, Instruction, UpvalCapture};
use tuff::compiler;
use tuff::debug::Disassembler;
use tuff::memory::{Gc, Heap};
use tuff::object::FnObj;
use tuff::value::Value;

fn sample_instructions() -> Vec<Instruction> {
    vec![
        Instruction::OpConstant(0),
        Instruction::OpNil,
        Instruction::OpTrue,
        Instruction::OpFalse,
        Instruction::OpPop,
        Instruction::OpGetLocal(3),
        Instruction::OpSetLocal(3),
        Instruction::OpGetUpvalue(1),
        Instruction::OpSetUpvalue(1),
        Instruction::OpGetGlobal(0),
        Instruction::OpDefineGlobal(0),
        Instruction::OpSetGlobal(0),
        Instruction::OpGetProperty(0),
        Instruction::OpSetProperty(0),
        Instruction::OpGetSuper(0),
        Instruction::OpEqual,
        Instruction::OpNotEqual,
        Instruction::OpGreater,
        Instruction::OpGreaterEqual,
        Instruction::OpLess,
        Instruction::OpLessEqual,
        Instruction::OpAdd,
        Instruction::OpSubtract,
        Instruction::OpMultiply,
        Instruction::OpDivide,
        Instruction::OpNot,
        Instruction::OpNegate,
        Instruction::OpJump(0x0102),
        Instruction::OpJumpIfFalse(0xfffe),
        Instruction::OpLoop(7),
        Instruction::OpCall(2),
        Instruction::OpInvoke(0, 2),
        Instruction::OpSuperInvoke(0, 1),
        Instruction::OpCloseUpvalue,
        Instruction::OpReturn,
        Instruction::OpClass(0),
        Instruction::OpInherit,
        Instruction::OpMethod(0),
        Instruction::OpArrayNew(512),
        Instruction::OpTableNew,
        Instruction::OpGet,
        Instruction::OpSet,
        Instruction::OpGetNoPop,
        Instruction::OpSetNoPop,
    ]
}

#[test]
fn test_roundtrip_and_width() {
    let mut chunk = Chunk::new();
    let mut heap = Heap::new();
    chunk.push_constant(Value::String(heap.create_string("name")));

    let instructions = sample_instructions();
    let mut offsets = Vec::new();
    for (i, instr) in instructions.iter().enumerate() {
        offsets.push(chunk.push_instruction(instr.clone(), i as u32));
    }

    for (i, instr) in instructions.iter().enumerate() {
        let (size, decoded) = chunk.read_instruction(offsets[i]);
        assert_eq!(*instr, decoded, "instruction {} decoded differently", i);
        let expected_size: Vec<u8> = instr.clone().into();
        assert_eq!(
            expected_size.len(),
            size,
            "instruction {} has wrong width",
            i
        );
    }
}

#[test]
fn test_closure_roundtrip_reads_declared_captures() {
    let mut chunk = Chunk::new();
    let fn_obj = FnObj::new(Chunk::new(), 0, 2, None);
    let fn_const = chunk.push_constant(Value::Function(Gc::new(fn_obj)));

    let captures = vec![
        UpvalCapture {
            is_local: true,
            index: 1,
        },
        UpvalCapture {
            is_local: false,
            index: 0,
        },
    ];
    let at = chunk.push_instruction(
        Instruction::OpClosure(fn_const as u8, captures.clone()),
        1,
    );

    let (size, decoded) = chunk.read_instruction(at);
    assert_eq!(6, size); // 2 bytes + 2 * upvalue_count
    assert_eq!(Instruction::OpClosure(fn_const as u8, captures), decoded);
}

#[test]
fn test_jump_operands_are_big_endian() {
    let bytes: Vec<u8> = Instruction::OpJump(0x0102).into();
    assert_eq!(3, bytes.len());
    assert_eq!([0x01, 0x02], bytes[1..]);
}

#[test]
fn test_every_byte_has_a_line() {
    let mut chunk = Chunk::new();
    chunk.push_instruction(Instruction::OpConstant(0), 1);
    chunk.push_instruction(Instruction::OpJump(10), 2);
    chunk.push_instruction(Instruction::OpReturn, 3);

    assert_eq!(6, chunk.code_len());
    let expected = [1, 1, 2, 2, 2, 3];
    for (offset, line) in expected.iter().enumerate() {
        assert_eq!(*line, chunk.line_at(offset), "byte {}", offset);
    }
}

#[test]
fn test_iterator_covers_chunk_exactly() {
    let mut chunk = Chunk::new();
    for instr in sample_instructions() {
        chunk.push_instruction(instr, 1);
    }

    let mut walked = 0;
    for (offset, _) in chunk.iter() {
        assert_eq!(walked, offset);
        let (size, _) = chunk.read_instruction(offset);
        walked += size;
    }
    assert_eq!(chunk.code_len(), walked);
}

#[test]
fn test_disassembler_yields_one_line_per_instruction() {
    let mut chunk = Chunk::new();
    let instructions = sample_instructions();
    let count = instructions.len();
    for instr in instructions {
        chunk.push_instruction(instr, 1);
    }

    assert_eq!(count, Disassembler::new(&chunk).count());
}

fn assert_closure_captures(chunk: &Chunk) {
    for (_, instr) in chunk.iter() {
        if let Instruction::OpClosure(fn_const, captures) = instr {
            match chunk.get_constant(fn_const) {
                Value::Function(fn_obj) => {
                    assert_eq!(
                        fn_obj.upvalue_count(),
                        captures.len(),
                        "capture directives must match the declared upvalue count"
                    );
                    assert_closure_captures(&fn_obj.chunk);
                }
                other => panic!("closure constant is not a function: {:?}", other),
            }
        }
    }
}

fn find_function<'a>(chunk: &'a Chunk, name: &str) -> Option<&'a tuff::memory::Gc<FnObj>> {
    for (_, instr) in chunk.iter() {
        if let Instruction::OpClosure(fn_const, _) = instr {
            if let Value::Function(fn_obj) = chunk.get_constant(fn_const) {
                if fn_obj.name().map_or(false, |n| n.chars == name) {
                    return Some(fn_obj);
                }
                if let Some(found) = find_function(&fn_obj.chunk, name) {
                    return Some(found);
                }
            }
        }
    }
    None
}

#[test]
fn test_repeated_references_share_one_upvalue_slot() {
    // several mentions of one captured variable must not inflate the
    // function's upvalue count
    let source = r#"
fun outer() {
  var x = 0;
  fun inner() {
    x = x + 1;
    x = x + x;
    return x;
  }
  return inner;
}
"#;
    let mut heap = Heap::new();
    let mut err = Vec::new();
    let script_fn = compiler::compile(source, &mut heap, &mut err)
        .unwrap_or_else(|| panic!("compile failed: {}", String::from_utf8_lossy(&err)));

    let inner = find_function(&script_fn.chunk, "inner").expect("inner function constant");
    assert_eq!(1, inner.upvalue_count());
    assert_closure_captures(&script_fn.chunk);
}

#[test]
fn test_multi_hop_capture_dedups_at_each_level() {
    let source = r#"
fun outer() {
  var x = 0;
  fun middle() {
    fun inner() {
      return x + x + x;
    }
    return x + inner();
  }
  return middle;
}
"#;
    let mut heap = Heap::new();
    let mut err = Vec::new();
    let script_fn = compiler::compile(source, &mut heap, &mut err)
        .unwrap_or_else(|| panic!("compile failed: {}", String::from_utf8_lossy(&err)));

    let middle = find_function(&script_fn.chunk, "middle").expect("middle function constant");
    let inner = find_function(&script_fn.chunk, "inner").expect("inner function constant");
    assert_eq!(1, middle.upvalue_count());
    assert_eq!(1, inner.upvalue_count());
}

#[test]
fn test_compiled_closures_declare_their_captures() {
    let source = r#"
fun outer() {
  var a = 1;
  var b = 2;
  fun middle() {
    fun inner() {
      return a + b;
    }
    return inner;
  }
  return middle;
}
print(outer()()());
"#;
    let mut heap = Heap::new();
    let mut err = Vec::new();
    let script_fn = compiler::compile(source, &mut heap, &mut err)
        .unwrap_or_else(|| panic!("compile failed: {}", String::from_utf8_lossy(&err)));
    assert_closure_captures(&script_fn.chunk);
}
