use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use fnv::FnvBuildHasher;

use crate::object::StrObj;

/// Shared-ownership handle to a heap object. Cloning a `Gc` increments the
/// reference count, dropping it decrements; the object's destructor runs
/// exactly once, when the last handle goes away. Reference cycles are not
/// collected.
pub struct Gc<T> {
    ptr: Rc<T>,
}

impl<T> Gc<T> {
    pub fn new(value: T) -> Self {
        Gc {
            ptr: Rc::new(value),
        }
    }

    pub fn ptr_eq(&self, other: &Gc<T>) -> bool {
        Rc::ptr_eq(&self.ptr, &other.ptr)
    }

    /// Stable address of the allocation, used to hash objects that are
    /// compared by identity.
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.ptr) as usize
    }

    pub fn refcount(&self) -> usize {
        Rc::strong_count(&self.ptr)
    }
}

impl<T> Clone for Gc<T> {
    fn clone(&self) -> Self {
        Gc {
            ptr: Rc::clone(&self.ptr),
        }
    }
}

impl<T> Deref for Gc<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.ptr
    }
}

impl<T: fmt::Debug> fmt::Debug for Gc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.ptr.fmt(f)
    }
}

impl<T: fmt::Display> fmt::Display for Gc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.ptr.fmt(f)
    }
}

/// Owns the string interner. Strings created at compile time and at runtime
/// go through the same table, so two equal string contents always resolve to
/// the same `Gc<StrObj>` and string equality is pointer equality.
pub struct Heap {
    strings: HashSet<Gc<StrObj>, FnvBuildHasher>,
}

impl Heap {
    pub fn new() -> Self {
        Heap {
            strings: HashSet::default(),
        }
    }

    /// Returns the canonical string object for `chars`, allocating it on
    /// first sight.
    pub fn create_string(&mut self, chars: &str) -> Gc<StrObj> {
        if let Some(interned) = self.strings.get(chars) {
            return interned.clone();
        }
        let str_obj = Gc::new(StrObj::new(chars));
        self.strings.insert(str_obj.clone());
        str_obj
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}
