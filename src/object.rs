use std::borrow::Borrow;
use std::cell::RefCell;
use std::cmp;
use std::fmt;
use std::hash;
use std::io;

use fnv::FnvHashMap;

use crate::chunk::Chunk;
use crate::memory::Gc;
use crate::value::Value;

/// 32-bit FNV-1a, precomputed for every interned string.
pub fn hash_string(bytes: &[u8]) -> u32 {
    let mut hash = 2166136261u32;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

// === StrObj ===

/// Immutable string contents plus the precomputed content hash. Every
/// `StrObj` is owned by the interner, so handle identity doubles as content
/// equality.
#[derive(Debug)]
pub struct StrObj {
    pub chars: String,
    pub hash: u32,
}

impl StrObj {
    pub fn new(chars: &str) -> Self {
        StrObj {
            hash: hash_string(chars.as_bytes()),
            chars: chars.to_string(),
        }
    }
}

// Since all strings are interned, string equality is the same as handle
// identity.
impl cmp::PartialEq for Gc<StrObj> {
    fn eq(&self, other: &Gc<StrObj>) -> bool {
        self.ptr_eq(other)
    }
}

impl cmp::Eq for Gc<StrObj> {}

impl hash::Hash for Gc<StrObj> {
    fn hash<H: hash::Hasher>(&self, state: &mut H) {
        self.chars.hash(state);
    }
}

impl Borrow<str> for Gc<StrObj> {
    fn borrow(&self) -> &str {
        &self.chars
    }
}

impl fmt::Display for StrObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.chars)
    }
}

// === FnObj ===

pub struct FnObj {
    pub chunk: Chunk,
    arity: u8,
    upvalue_count: usize,
    name: Option<Gc<StrObj>>,
}

impl FnObj {
    pub fn new(chunk: Chunk, arity: u8, upvalue_count: usize, name: Option<Gc<StrObj>>) -> Self {
        FnObj {
            chunk,
            arity,
            upvalue_count,
            name,
        }
    }

    pub fn name(&self) -> Option<&Gc<StrObj>> {
        self.name.as_ref()
    }

    pub fn arity(&self) -> u8 {
        self.arity
    }

    pub fn upvalue_count(&self) -> usize {
        self.upvalue_count
    }
}

impl fmt::Debug for FnObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnObj")
            .field("arity", &self.arity)
            .field("upvalue_count", &self.upvalue_count)
            .field("name", &format_args!("{:?}", &self.name))
            .finish()
    }
}

impl fmt::Display for FnObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "<fn {}>", name),
            None => f.write_str("<script>"),
        }
    }
}

// === UpvalObj ===

/// A captured variable. Open while the stack slot it refers to is still
/// live, closed once the value has been hoisted into the upvalue itself.
#[derive(Debug)]
pub enum UpvalState {
    Open(usize),
    Closed(Value),
}

#[derive(Debug)]
pub struct UpvalObj {
    pub state: RefCell<UpvalState>,
}

impl UpvalObj {
    pub fn open(slot: usize) -> Self {
        UpvalObj {
            state: RefCell::new(UpvalState::Open(slot)),
        }
    }

    /// The stack slot this upvalue points at, if it is still open.
    pub fn open_slot(&self) -> Option<usize> {
        match *self.state.borrow() {
            UpvalState::Open(slot) => Some(slot),
            UpvalState::Closed(_) => None,
        }
    }

    pub fn close(&self, value: Value) {
        *self.state.borrow_mut() = UpvalState::Closed(value);
    }
}

// === ClosureObj ===

#[derive(Debug)]
pub struct ClosureObj {
    pub function: Gc<FnObj>,
    pub upvalues: Vec<Gc<UpvalObj>>,
}

impl ClosureObj {
    pub fn new(function: Gc<FnObj>, upvalues: Vec<Gc<UpvalObj>>) -> Self {
        ClosureObj { function, upvalues }
    }
}

impl fmt::Display for ClosureObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.function.fmt(f)
    }
}

// === NativeObj ===

pub type NativeFn = fn(&[Value], &mut dyn io::Write) -> Result<Value, String>;

pub struct NativeObj {
    pub function: NativeFn,
}

impl NativeObj {
    pub fn new(function: NativeFn) -> Self {
        NativeObj { function }
    }
}

impl fmt::Debug for NativeObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NativeObj")
    }
}

impl fmt::Display for NativeObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<native fn>")
    }
}

// === ClassObj ===

#[derive(Debug)]
pub struct ClassObj {
    pub name: Gc<StrObj>,
    pub methods: RefCell<FnvHashMap<Gc<StrObj>, Gc<ClosureObj>>>,
}

impl ClassObj {
    pub fn new(name: Gc<StrObj>) -> Self {
        ClassObj {
            name,
            methods: RefCell::new(FnvHashMap::default()),
        }
    }

    pub fn find_method(&self, name: &Gc<StrObj>) -> Option<Gc<ClosureObj>> {
        self.methods.borrow().get(name).cloned()
    }
}

impl fmt::Display for ClassObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.name.fmt(f)
    }
}

// === InstanceObj ===

#[derive(Debug)]
pub struct InstanceObj {
    pub class: Gc<ClassObj>,
    pub fields: RefCell<FnvHashMap<Gc<StrObj>, Value>>,
}

impl InstanceObj {
    pub fn new(class: Gc<ClassObj>) -> Self {
        InstanceObj {
            class,
            fields: RefCell::new(FnvHashMap::default()),
        }
    }
}

impl fmt::Display for InstanceObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name)
    }
}

// === BoundMethodObj ===

#[derive(Debug)]
pub struct BoundMethodObj {
    pub receiver: Value,
    pub method: Gc<ClosureObj>,
}

impl BoundMethodObj {
    pub fn new(receiver: Value, method: Gc<ClosureObj>) -> Self {
        BoundMethodObj { receiver, method }
    }
}

impl fmt::Display for BoundMethodObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.method.fmt(f)
    }
}

// === ArrayObj ===

/// Dynamic value sequence. Subscripts accept negative indices, which count
/// back from the end.
#[derive(Debug)]
pub struct ArrayObj {
    pub values: RefCell<Vec<Value>>,
}

impl ArrayObj {
    pub fn with_len(len: usize) -> Self {
        ArrayObj {
            values: RefCell::new(vec![Value::Nil; len]),
        }
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    fn normalize(&self, index: i64) -> Option<usize> {
        let count = self.len() as i64;
        let index = if index < 0 { index + count } else { index };
        if (0..count).contains(&index) {
            Some(index as usize)
        } else {
            None
        }
    }

    pub fn get(&self, index: i64) -> Option<Value> {
        let index = self.normalize(index)?;
        Some(self.values.borrow()[index].clone())
    }

    pub fn set(&self, index: i64, value: Value) -> bool {
        match self.normalize(index) {
            Some(index) => {
                self.values.borrow_mut()[index] = value;
                true
            }
            None => false,
        }
    }
}

impl fmt::Display for ArrayObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, value) in self.values.borrow().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            value.fmt(f)?;
        }
        f.write_str("]")
    }
}

// === TableObj ===

/// Hash map from value to value. Key equality and hashing follow the
/// `Value` contract, so interned strings, numbers, booleans and nil all
/// behave as keys.
#[derive(Debug)]
pub struct TableObj {
    pub entries: RefCell<FnvHashMap<Value, Value>>,
}

impl TableObj {
    pub fn new() -> Self {
        TableObj {
            entries: RefCell::new(FnvHashMap::default()),
        }
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn set(&self, key: Value, value: Value) {
        self.entries.borrow_mut().insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Default for TableObj {
    fn default() -> Self {
        TableObj::new()
    }
}

impl fmt::Display for TableObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        f.write_str("{ ")?;
        for (i, (key, value)) in self.entries.borrow().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} = {}", key, value)?;
        }
        f.write_str(" }")
    }
}
