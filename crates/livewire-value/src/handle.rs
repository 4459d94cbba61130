//! Live handles: values that refer to running state rather than data.
//!
//! Neither [`Var`] nor [`NativeFn`] can be written to bytes. The codec
//! replaces them with a foreign-reference token instead.

use std::fmt;
use std::sync::{PoisonError, RwLock};

use crate::{Symbol, Value, ValueError};

/// A named, mutable binding.
pub struct Var {
    name: Symbol,
    root: RwLock<Value>,
}

impl Var {
    /// Creates a var bound to `root`.
    pub fn new(name: Symbol, root: Value) -> Self {
        Self {
            name,
            root: RwLock::new(root),
        }
    }

    /// The var's qualified name.
    pub fn name(&self) -> &Symbol {
        &self.name
    }

    /// Current root value.
    pub fn deref(&self) -> Value {
        self.root
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the root value.
    pub fn set(&self, value: Value) {
        *self.root.write().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#'{}", self.name)
    }
}

type NativeBody = dyn Fn(&[Value]) -> Result<Value, ValueError> + Send + Sync;

/// A function implemented in Rust and callable with host values.
pub struct NativeFn {
    name: String,
    body: Box<NativeBody>,
}

impl NativeFn {
    /// Wraps a closure as a named function.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, ValueError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Box::new(body),
        }
    }

    /// The function's name, for diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invokes the function.
    ///
    /// # Errors
    /// Whatever the function body returns.
    pub fn call(&self, args: &[Value]) -> Result<Value, ValueError> {
        (self.body)(args)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<fn {}>", self.name)
    }
}
