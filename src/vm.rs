use std::io::Write;

use fnv::FnvHashMap;

use crate::builtins;
use crate::chunk::Instruction;
use crate::compiler;
use crate::error::{ErrorKind, RuntimeError, StackFrame, VmError};
use crate::memory::{Gc, Heap};
use crate::object::{
    ArrayObj, BoundMethodObj, ClassObj, ClosureObj, InstanceObj, NativeFn, NativeObj, StrObj,
    TableObj, UpvalObj, UpvalState,
};
use crate::value::Value;

const FRAMES_MAX: usize = 64;
const STACK_MAX: usize = FRAMES_MAX * (u8::MAX as usize + 1);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterpretResult {
    Ok,
    CompileError,
    RuntimeError,
}

struct CallFrame {
    closure: Gc<ClosureObj>,
    ip: usize,
    frame_ptr: usize,
}

/// The interpreter. One `Vm` owns its heap, globals and interner, so a
/// REPL session keeps definitions across `interpret` calls.
pub struct Vm<'w> {
    call_frames: Vec<CallFrame>,
    stack: Vec<Value>,
    globals: FnvHashMap<Gc<StrObj>, Value>,
    open_upvalues: Vec<Gc<UpvalObj>>,
    heap: Heap,
    init_string: Gc<StrObj>,
    out: &'w mut dyn Write,
    err: &'w mut dyn Write,
}

impl<'w> Vm<'w> {
    pub fn new(out: &'w mut dyn Write, err: &'w mut dyn Write) -> Self {
        let mut heap = Heap::new();
        let init_string = heap.create_string("init");

        let mut vm = Vm {
            call_frames: Vec::with_capacity(FRAMES_MAX),
            stack: Vec::with_capacity(STACK_MAX),
            globals: FnvHashMap::default(),
            open_upvalues: Vec::new(),
            heap,
            init_string,
            out,
            err,
        };

        vm.define_native("clock", builtins::clock);
        vm.define_native("print", builtins::print);
        vm
    }

    pub fn interpret(&mut self, source: &str) -> InterpretResult {
        let script_fn = match compiler::compile(source, &mut self.heap, &mut *self.err) {
            Some(script_fn) => script_fn,
            None => return InterpretResult::CompileError,
        };

        let closure = Gc::new(ClosureObj::new(script_fn, Vec::new()));
        self.stack.push(Value::Closure(closure.clone()));
        if let Err(runtime_err) = self.call(closure, 0) {
            self.report_runtime_error(&runtime_err);
            return InterpretResult::RuntimeError;
        }

        match self.run() {
            Ok(()) => InterpretResult::Ok,
            Err(runtime_err) => {
                self.report_runtime_error(&runtime_err);
                InterpretResult::RuntimeError
            }
        }
    }

    fn report_runtime_error(&mut self, runtime_err: &RuntimeError) {
        let _ = writeln!(self.err, "{}", runtime_err);
        self.stack.clear();
        self.call_frames.clear();
        self.open_upvalues.clear();
    }

    fn call_frame(&self) -> &CallFrame {
        self.call_frames.last().expect("empty call frames stack")
    }

    fn call_frame_mut(&mut self) -> &mut CallFrame {
        self.call_frames
            .last_mut()
            .expect("empty call frames stack")
    }

    fn read_constant(&self, offset: u8) -> Value {
        self.call_frame()
            .closure
            .function
            .chunk
            .get_constant(offset)
            .clone()
    }

    fn read_string(&self, offset: u8) -> Result<Gc<StrObj>, RuntimeError> {
        match self.read_constant(offset) {
            Value::String(name) => Ok(name),
            _ => Err(self.runtime_error(ErrorKind::InternalError(VmError::UnexpectedConstant))),
        }
    }

    pub fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            #[cfg(feature = "debug-trace")]
            {
                let mut rendered = String::from("          ");
                for slot in &self.stack {
                    rendered.push_str(&format!("[ {} ]", slot));
                }
                println!("{}", rendered);
                let frame = self.call_frame();
                println!(
                    "{}",
                    crate::debug::render_at(&frame.closure.function.chunk, frame.ip)
                );
            }

            let frame_ip = self.call_frame().ip;
            let (instr_size, instr) = self
                .call_frame()
                .closure
                .function
                .chunk
                .read_instruction(frame_ip);
            self.call_frame_mut().ip = frame_ip + instr_size;

            match instr {
                Instruction::OpConstant(val_offset) => {
                    let val = self.read_constant(val_offset);
                    self.push(val);
                }
                Instruction::OpNil => self.push(Value::Nil),
                Instruction::OpTrue => self.push(Value::Boolean(true)),
                Instruction::OpFalse => self.push(Value::Boolean(false)),

                Instruction::OpPop => {
                    self.pop()?;
                }

                Instruction::OpGetLocal(stack_ix) => {
                    let slot = self.call_frame().frame_ptr + stack_ix as usize;
                    match self.stack.get(slot) {
                        Some(val) => {
                            let val = val.clone();
                            self.push(val);
                        }
                        None => {
                            return Err(self.runtime_error(ErrorKind::InternalError(
                                VmError::EmptyStackPop,
                            )));
                        }
                    }
                }

                Instruction::OpSetLocal(stack_ix) => {
                    let new_val = self.peek(0)?;
                    let slot = self.call_frame().frame_ptr + stack_ix as usize;
                    match self.stack.get_mut(slot) {
                        Some(val) => {
                            *val = new_val;
                        }
                        None => {
                            return Err(self.runtime_error(ErrorKind::InternalError(
                                VmError::EmptyStackPop,
                            )));
                        }
                    }
                }

                Instruction::OpGetUpvalue(upval_ix) => {
                    let upval = self.frame_upvalue(upval_ix)?;
                    let val = match *upval.state.borrow() {
                        UpvalState::Open(slot) => self.stack[slot].clone(),
                        UpvalState::Closed(ref val) => val.clone(),
                    };
                    self.push(val);
                }

                Instruction::OpSetUpvalue(upval_ix) => {
                    let new_val = self.peek(0)?;
                    let upval = self.frame_upvalue(upval_ix)?;
                    let open_slot = {
                        let mut state = upval.state.borrow_mut();
                        match *state {
                            UpvalState::Open(slot) => Some(slot),
                            UpvalState::Closed(ref mut stored) => {
                                *stored = new_val.clone();
                                None
                            }
                        }
                    };
                    if let Some(slot) = open_slot {
                        self.stack[slot] = new_val;
                    }
                }

                Instruction::OpGetGlobal(val_offset) => {
                    let var_name = self.read_string(val_offset)?;
                    match self.globals.get(&var_name) {
                        Some(val) => {
                            let val = val.clone();
                            self.push(val);
                        }
                        None => {
                            return Err(
                                self.runtime_error(ErrorKind::UndefinedVariable(var_name))
                            );
                        }
                    }
                }

                Instruction::OpDefineGlobal(val_offset) => {
                    let var_name = self.read_string(val_offset)?;
                    let init_val = self.pop()?;
                    self.globals.insert(var_name, init_val);
                }

                Instruction::OpSetGlobal(val_offset) => {
                    let var_name = self.read_string(val_offset)?;
                    let new_val = self.peek(0)?;
                    if self.globals.insert(var_name.clone(), new_val).is_none() {
                        // undo the tentative insert before raising
                        self.globals.remove(&var_name);
                        return Err(self.runtime_error(ErrorKind::UndefinedVariable(var_name)));
                    }
                }

                Instruction::OpEqual => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push(Value::Boolean(lhs == rhs));
                }

                Instruction::OpNotEqual => {
                    let rhs = self.pop()?;
                    let lhs = self.pop()?;
                    self.push(Value::Boolean(lhs != rhs));
                }

                Instruction::OpGreater => {
                    let (lhs, rhs) = self.pop_number_pair()?;
                    self.push(Value::Boolean(lhs > rhs));
                }

                Instruction::OpGreaterEqual => {
                    let (lhs, rhs) = self.pop_number_pair()?;
                    self.push(Value::Boolean(lhs >= rhs));
                }

                Instruction::OpLess => {
                    let (lhs, rhs) = self.pop_number_pair()?;
                    self.push(Value::Boolean(lhs < rhs));
                }

                Instruction::OpLessEqual => {
                    let (lhs, rhs) = self.pop_number_pair()?;
                    self.push(Value::Boolean(lhs <= rhs));
                }

                Instruction::OpAdd => match (self.peek(1)?, self.peek(0)?) {
                    (Value::String(lstr), Value::String(rstr)) => {
                        self.pop()?;
                        self.pop()?;
                        let result = self.concatenate(&lstr, &rstr);
                        self.push(result);
                    }
                    (Value::Double(_), Value::Double(_)) => {
                        let (lhs, rhs) = self.pop_number_pair()?;
                        self.push(Value::Double(lhs + rhs));
                    }
                    _ => {
                        return Err(self.runtime_error(ErrorKind::OperandsMustBeNumbersOrStrings));
                    }
                },

                Instruction::OpSubtract => {
                    let (lhs, rhs) = self.pop_number_pair()?;
                    self.push(Value::Double(lhs - rhs));
                }

                Instruction::OpMultiply => {
                    let (lhs, rhs) = self.pop_number_pair()?;
                    self.push(Value::Double(lhs * rhs));
                }

                Instruction::OpDivide => {
                    let (lhs, rhs) = self.pop_number_pair()?;
                    self.push(Value::Double(lhs / rhs));
                }

                Instruction::OpNot => {
                    let val = self.pop()?;
                    self.push(Value::Boolean(val.is_falsey()));
                }

                Instruction::OpNegate => {
                    match self.peek(0)? {
                        Value::Double(_) => {}
                        _ => return Err(self.runtime_error(ErrorKind::OperandMustBeNumber)),
                    }
                    if let Value::Double(val) = self.pop()? {
                        self.push(Value::Double(-val));
                    }
                }

                Instruction::OpJump(offset) => {
                    self.call_frame_mut().ip += offset as usize;
                }

                Instruction::OpJumpIfFalse(offset) => {
                    if self.peek(0)?.is_falsey() {
                        self.call_frame_mut().ip += offset as usize;
                    }
                }

                Instruction::OpLoop(offset) => {
                    self.call_frame_mut().ip -= offset as usize;
                }

                Instruction::OpCall(args) => {
                    let callee = self.peek(args as usize)?;
                    self.call_value(callee, args)?;
                }

                Instruction::OpInvoke(name_offset, args) => {
                    let name = self.read_string(name_offset)?;
                    self.invoke(name, args)?;
                }

                Instruction::OpSuperInvoke(name_offset, args) => {
                    let name = self.read_string(name_offset)?;
                    let superclass = match self.pop()? {
                        Value::Class(superclass) => superclass,
                        _ => {
                            return Err(self.runtime_error(ErrorKind::InternalError(
                                VmError::UnexpectedConstant,
                            )));
                        }
                    };
                    self.invoke_from_class(superclass, name, args)?;
                }

                Instruction::OpClosure(val_offset, captures) => {
                    let fn_obj = match self.read_constant(val_offset) {
                        Value::Function(fn_obj) => fn_obj,
                        _ => {
                            return Err(self.runtime_error(ErrorKind::InternalError(
                                VmError::UnexpectedConstant,
                            )));
                        }
                    };

                    let mut upvalues = Vec::with_capacity(captures.len());
                    for capture in &captures {
                        if capture.is_local {
                            let slot = self.call_frame().frame_ptr + capture.index as usize;
                            upvalues.push(self.capture_upvalue(slot));
                        } else {
                            upvalues.push(self.frame_upvalue(capture.index)?);
                        }
                    }

                    let closure = ClosureObj::new(fn_obj, upvalues);
                    self.push(Value::Closure(Gc::new(closure)));
                }

                Instruction::OpCloseUpvalue => {
                    let last = match self.stack.len().checked_sub(1) {
                        Some(last) => last,
                        None => {
                            return Err(self.runtime_error(ErrorKind::InternalError(
                                VmError::EmptyStackPop,
                            )));
                        }
                    };
                    self.close_upvalues(last);
                    self.pop()?;
                }

                Instruction::OpReturn => {
                    let result = self.pop()?;
                    let frame = match self.call_frames.pop() {
                        Some(frame) => frame,
                        None => {
                            return Err(self.runtime_error(ErrorKind::InternalError(
                                VmError::EmptyStackPop,
                            )));
                        }
                    };

                    self.close_upvalues(frame.frame_ptr);

                    if self.call_frames.is_empty() {
                        // drop the script closure; successful termination
                        self.pop()?;
                        return Ok(());
                    }

                    self.stack.truncate(frame.frame_ptr);
                    self.push(result);
                }

                Instruction::OpClass(val_offset) => {
                    let name = self.read_string(val_offset)?;
                    self.push(Value::Class(Gc::new(ClassObj::new(name))));
                }

                Instruction::OpInherit => {
                    let superclass = match self.peek(1)? {
                        Value::Class(superclass) => superclass,
                        _ => {
                            return Err(self.runtime_error(ErrorKind::SuperclassMustBeClass));
                        }
                    };
                    let subclass = match self.peek(0)? {
                        Value::Class(subclass) => subclass,
                        _ => {
                            return Err(self.runtime_error(ErrorKind::InternalError(
                                VmError::UnexpectedConstant,
                            )));
                        }
                    };
                    // inherited methods are copied down up front; later
                    // additions to the superclass are not seen
                    for (name, method) in superclass.methods.borrow().iter() {
                        subclass
                            .methods
                            .borrow_mut()
                            .insert(name.clone(), method.clone());
                    }
                    self.pop()?;
                }

                Instruction::OpMethod(name_offset) => {
                    let name = self.read_string(name_offset)?;
                    let method = match self.peek(0)? {
                        Value::Closure(method) => method,
                        _ => {
                            return Err(self.runtime_error(ErrorKind::InternalError(
                                VmError::UnexpectedConstant,
                            )));
                        }
                    };
                    let class = match self.peek(1)? {
                        Value::Class(class) => class,
                        _ => {
                            return Err(self.runtime_error(ErrorKind::InternalError(
                                VmError::UnexpectedConstant,
                            )));
                        }
                    };
                    class.methods.borrow_mut().insert(name, method);
                    self.pop()?;
                }

                Instruction::OpGetProperty(name_offset) => {
                    let name = self.read_string(name_offset)?;
                    let instance = match self.peek(0)? {
                        Value::Instance(instance) => instance,
                        _ => return Err(self.runtime_error(ErrorKind::NoProperties)),
                    };

                    let field = instance.fields.borrow().get(&name).cloned();
                    match field {
                        Some(val) => {
                            self.pop()?;
                            self.push(val);
                        }
                        None => {
                            self.bind_method(instance.class.clone(), name)?;
                        }
                    }
                }

                Instruction::OpSetProperty(name_offset) => {
                    let name = self.read_string(name_offset)?;
                    let instance = match self.peek(1)? {
                        Value::Instance(instance) => instance,
                        _ => return Err(self.runtime_error(ErrorKind::NoFields)),
                    };

                    let val = self.pop()?;
                    self.pop()?; // the instance
                    instance.fields.borrow_mut().insert(name, val.clone());
                    self.push(val);
                }

                Instruction::OpGetSuper(name_offset) => {
                    let name = self.read_string(name_offset)?;
                    let superclass = match self.pop()? {
                        Value::Class(superclass) => superclass,
                        _ => {
                            return Err(self.runtime_error(ErrorKind::InternalError(
                                VmError::UnexpectedConstant,
                            )));
                        }
                    };
                    self.bind_method(superclass, name)?;
                }

                Instruction::OpArrayNew(size) => {
                    let array = ArrayObj::with_len(size as usize);
                    self.push(Value::Array(Gc::new(array)));
                }

                Instruction::OpTableNew => {
                    self.push(Value::Table(Gc::new(TableObj::new())));
                }

                Instruction::OpGet => {
                    let key = self.pop()?;
                    let container = self.pop()?;
                    let val = self.subscript_get(&container, &key)?;
                    self.push(val);
                }

                Instruction::OpSet => {
                    let val = self.pop()?;
                    let key = self.pop()?;
                    let container = self.pop()?;
                    self.subscript_set(&container, key, val.clone())?;
                    self.push(val);
                }

                Instruction::OpGetNoPop => {
                    let key = self.pop()?;
                    let container = self.peek(0)?;
                    let val = self.subscript_get(&container, &key)?;
                    self.push(val);
                }

                Instruction::OpSetNoPop => {
                    let val = self.pop()?;
                    let key = self.pop()?;
                    let container = self.peek(0)?;
                    self.subscript_set(&container, key, val)?;
                }

                Instruction::OpInvalid => {
                    return Err(
                        self.runtime_error(ErrorKind::InternalError(VmError::InvalidOpCode))
                    );
                }
            }
        }
    }

    // === calls ===
    fn call_value(&mut self, callee: Value, arg_count: u8) -> Result<(), RuntimeError> {
        match callee {
            Value::Closure(clos_obj) => self.call(clos_obj, arg_count),
            Value::Native(native_obj) => self.call_native(native_obj, arg_count),
            Value::Class(class_obj) => self.instantiate(class_obj, arg_count),
            Value::BoundMethod(bound_obj) => {
                let receiver_slot = self.stack.len() - arg_count as usize - 1;
                self.stack[receiver_slot] = bound_obj.receiver.clone();
                self.call(bound_obj.method.clone(), arg_count)
            }
            _ => Err(self.runtime_error(ErrorKind::NotCallable)),
        }
    }

    fn call(&mut self, closure: Gc<ClosureObj>, arg_count: u8) -> Result<(), RuntimeError> {
        let exp_args = closure.function.arity();
        if arg_count != exp_args {
            return Err(self.runtime_error(ErrorKind::ArityMismatch {
                expected: exp_args,
                got: arg_count,
            }));
        }

        if self.call_frames.len() == FRAMES_MAX {
            return Err(self.runtime_error(ErrorKind::StackOverflow));
        }

        let frame_ptr = self.stack.len() - arg_count as usize - 1;
        self.call_frames.push(CallFrame {
            closure,
            ip: 0,
            frame_ptr,
        });
        Ok(())
    }

    fn call_native(&mut self, native: Gc<NativeObj>, arg_count: u8) -> Result<(), RuntimeError> {
        let arg_start = self.stack.len() - arg_count as usize;
        let result = (native.function)(&self.stack[arg_start..], &mut *self.out);
        let result = match result {
            Ok(val) => val,
            Err(msg) => return Err(self.runtime_error(ErrorKind::NativeError(msg))),
        };
        // the arguments and the callee collapse into the result
        self.stack.truncate(arg_start - 1);
        self.push(result);
        Ok(())
    }

    fn instantiate(&mut self, class: Gc<ClassObj>, arg_count: u8) -> Result<(), RuntimeError> {
        let instance = Value::Instance(Gc::new(InstanceObj::new(class.clone())));
        let callee_slot = self.stack.len() - arg_count as usize - 1;
        self.stack[callee_slot] = instance;

        if let Some(init) = class.find_method(&self.init_string) {
            self.call(init, arg_count)
        } else if arg_count != 0 {
            Err(self.runtime_error(ErrorKind::ArityMismatch {
                expected: 0,
                got: arg_count,
            }))
        } else {
            Ok(())
        }
    }

    fn invoke(&mut self, name: Gc<StrObj>, arg_count: u8) -> Result<(), RuntimeError> {
        let instance = match self.peek(arg_count as usize)? {
            Value::Instance(instance) => instance,
            _ => return Err(self.runtime_error(ErrorKind::NoMethods)),
        };

        // a field holding a callable shadows a method of the same name
        let field = instance.fields.borrow().get(&name).cloned();
        if let Some(field_val) = field {
            let callee_slot = self.stack.len() - arg_count as usize - 1;
            self.stack[callee_slot] = field_val.clone();
            self.call_value(field_val, arg_count)
        } else {
            self.invoke_from_class(instance.class.clone(), name, arg_count)
        }
    }

    fn invoke_from_class(
        &mut self,
        class: Gc<ClassObj>,
        name: Gc<StrObj>,
        arg_count: u8,
    ) -> Result<(), RuntimeError> {
        match class.find_method(&name) {
            Some(method) => self.call(method, arg_count),
            None => Err(self.runtime_error(ErrorKind::UndefinedProperty(name))),
        }
    }

    fn bind_method(&mut self, class: Gc<ClassObj>, name: Gc<StrObj>) -> Result<(), RuntimeError> {
        let method = match class.find_method(&name) {
            Some(method) => method,
            None => return Err(self.runtime_error(ErrorKind::UndefinedProperty(name))),
        };
        let receiver = self.pop()?;
        let bound = BoundMethodObj::new(receiver, method);
        self.push(Value::BoundMethod(Gc::new(bound)));
        Ok(())
    }

    // === upvalues ===
    fn frame_upvalue(&self, upval_ix: u8) -> Result<Gc<UpvalObj>, RuntimeError> {
        match self.call_frame().closure.upvalues.get(upval_ix as usize) {
            Some(upval) => Ok(upval.clone()),
            None => Err(self.runtime_error(ErrorKind::InternalError(VmError::EmptyStackPop))),
        }
    }

    /// Finds or inserts the open upvalue for a stack slot. The list is kept
    /// sorted by descending slot so the insertion point is found before
    /// passing any lower slot.
    fn capture_upvalue(&mut self, slot: usize) -> Gc<UpvalObj> {
        let mut insert_at = self.open_upvalues.len();
        for (ix, upval) in self.open_upvalues.iter().enumerate() {
            match upval.open_slot() {
                Some(existing) if existing > slot => continue,
                Some(existing) if existing == slot => return upval.clone(),
                _ => {
                    insert_at = ix;
                    break;
                }
            }
        }

        let created = Gc::new(UpvalObj::open(slot));
        self.open_upvalues.insert(insert_at, created.clone());
        created
    }

    /// Closes every open upvalue pointing at `last` or above, moving the
    /// captured values off the stack and into the upvalues.
    fn close_upvalues(&mut self, last: usize) {
        let mut closed_count = 0;
        for upval in &self.open_upvalues {
            match upval.open_slot() {
                Some(slot) if slot >= last => {
                    upval.close(self.stack[slot].clone());
                    closed_count += 1;
                }
                _ => break,
            }
        }
        self.open_upvalues.drain(..closed_count);
    }

    // === subscripts ===
    fn subscript_get(&self, container: &Value, key: &Value) -> Result<Value, RuntimeError> {
        match container {
            Value::Array(array) => {
                let index = match key {
                    Value::Double(num) => *num as i64,
                    _ => return Err(self.runtime_error(ErrorKind::ArrayIndexNotNumber)),
                };
                match array.get(index) {
                    Some(val) => Ok(val),
                    None => Err(self.runtime_error(ErrorKind::ArrayIndexOutOfBounds {
                        count: array.len(),
                        index,
                    })),
                }
            }
            Value::Table(table) => match table.get(key) {
                Some(val) => Ok(val),
                None => Err(self.runtime_error(ErrorKind::MissingTableKey(key.to_string()))),
            },
            Value::Nil | Value::Boolean(_) | Value::Double(_) => {
                Err(self.runtime_error(ErrorKind::GetOnNonObject))
            }
            _ => Err(self.runtime_error(ErrorKind::NotSubscriptable)),
        }
    }

    fn subscript_set(
        &self,
        container: &Value,
        key: Value,
        val: Value,
    ) -> Result<(), RuntimeError> {
        match container {
            Value::Array(array) => {
                let index = match key {
                    Value::Double(num) => num as i64,
                    _ => return Err(self.runtime_error(ErrorKind::ArrayIndexNotNumber)),
                };
                if array.set(index, val) {
                    Ok(())
                } else {
                    Err(self.runtime_error(ErrorKind::ArrayIndexOutOfBounds {
                        count: array.len(),
                        index,
                    }))
                }
            }
            Value::Table(table) => {
                table.set(key, val);
                Ok(())
            }
            Value::Nil | Value::Boolean(_) | Value::Double(_) => {
                Err(self.runtime_error(ErrorKind::SetOnNonObject))
            }
            _ => Err(self.runtime_error(ErrorKind::NotSubscriptable)),
        }
    }

    // === native function FFI ===
    fn define_native(&mut self, name: &str, native: NativeFn) {
        let native_name = self.heap.create_string(name);
        let native_obj = Gc::new(NativeObj::new(native));
        self.globals.insert(native_name, Value::Native(native_obj));
    }

    // === error reporting ===
    fn runtime_error(&self, kind: ErrorKind) -> RuntimeError {
        RuntimeError::new(kind, self.stack_trace())
    }

    fn stack_trace(&self) -> Vec<StackFrame> {
        let mut trace = Vec::new();
        for frame in self.call_frames.iter().rev() {
            let chunk = &frame.closure.function.chunk;
            // ip sits just past the current instruction; every byte of an
            // instruction carries the opcode's line
            let offset = frame.ip.saturating_sub(1);
            let line = chunk.line_at(offset);
            trace.push(StackFrame::new(line, frame.closure.function.name().cloned()));
        }
        trace
    }

    // === stack APIs ===
    fn push(&mut self, val: Value) {
        self.stack.push(val);
    }

    fn pop(&mut self) -> Result<Value, RuntimeError> {
        match self.stack.pop() {
            Some(val) => Ok(val),
            None => Err(self.runtime_error(ErrorKind::InternalError(VmError::EmptyStackPop))),
        }
    }

    fn peek(&self, offset: usize) -> Result<Value, RuntimeError> {
        match self.stack.iter().rev().nth(offset) {
            Some(val) => Ok(val.clone()),
            None => Err(self.runtime_error(ErrorKind::InternalError(VmError::EmptyStackPop))),
        }
    }

    fn pop_number_pair(&mut self) -> Result<(f64, f64), RuntimeError> {
        match (self.peek(1)?, self.peek(0)?) {
            (Value::Double(lhs), Value::Double(rhs)) => {
                self.pop()?;
                self.pop()?;
                Ok((lhs, rhs))
            }
            _ => Err(self.runtime_error(ErrorKind::OperandsMustBeNumbers)),
        }
    }

    fn concatenate(&mut self, lstr: &Gc<StrObj>, rstr: &Gc<StrObj>) -> Value {
        // build the scratch buffer, then hand it to the interner; the
        // scratch copy is dropped if an equal string already exists
        let mut new_str = String::with_capacity(lstr.chars.len() + rstr.chars.len());
        new_str.push_str(&lstr.chars);
        new_str.push_str(&rstr.chars);
        Value::String(self.heap.create_string(&new_str))
    }
}
