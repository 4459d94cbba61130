//! Side table for live handles that travel as foreign references.
//!
//! When the codec meets a `Var` or `Fn`, it can't write the value itself.
//! It mints a token, remembers `token → value` here, and writes the token
//! instead. Decoding a foreign reference looks the token up in the same
//! table, so a live handle round-trips through any process that shares
//! this table (in practice: every connection of one bus).
//!
//! A handle keeps one token for as long as it is registered, however many
//! times it is sent. Entries hold their handle alive until released, one
//! at a time or all at once when the owning bus shuts down.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use livewire_value::Value;
use uuid::Uuid;

/// Shared `token → live value` table. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct ForeignTable {
    entries: Arc<Mutex<Entries>>,
}

#[derive(Debug, Default)]
struct Entries {
    by_token: HashMap<String, Value>,
    /// Handle allocation address → its token. The table holds a strong
    /// reference to every handle listed here, so addresses stay unique.
    by_handle: HashMap<usize, String>,
}

/// Address of the allocation behind a `Var` or `Fn`.
fn handle_address(value: &Value) -> Option<usize> {
    match value {
        Value::Var(var) => Some(Arc::as_ptr(var) as usize),
        Value::Fn(func) => Some(Arc::as_ptr(func) as usize),
        _ => None,
    }
}

impl ForeignTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` and returns its token.
    ///
    /// A live handle that is already registered gets its existing token
    /// back. New tokens are UUIDv7 strings: unique within and across
    /// processes and sortable by minting time.
    pub fn register(&self, value: Value) -> String {
        let mut entries = self.lock();
        let address = handle_address(&value);
        if let Some(token) = address.and_then(|a| entries.by_handle.get(&a)) {
            return token.clone();
        }

        let token = Uuid::now_v7().to_string();
        if let Some(address) = address {
            entries.by_handle.insert(address, token.clone());
        }
        entries.by_token.insert(token.clone(), value);
        token
    }

    /// Returns the value stored under `token`.
    pub fn resolve(&self, token: &str) -> Option<Value> {
        self.lock().by_token.get(token).cloned()
    }

    /// Forgets `token`. Returns `true` if it was present.
    pub fn release(&self, token: &str) -> bool {
        let mut entries = self.lock();
        let Some(value) = entries.by_token.remove(token) else {
            return false;
        };
        if let Some(address) = handle_address(&value) {
            entries.by_handle.remove(&address);
        }
        true
    }

    /// Forgets whatever token `handle` was registered under. Returns
    /// `true` if it was registered.
    pub fn release_handle(&self, handle: &Value) -> bool {
        let mut entries = self.lock();
        let Some(token) = handle_address(handle).and_then(|a| entries.by_handle.remove(&a)) else {
            return false;
        };
        entries.by_token.remove(&token);
        true
    }

    /// Forgets every entry, dropping the table's hold on each handle.
    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.by_token.clear();
        entries.by_handle.clear();
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.lock().by_token.len()
    }

    /// `true` if no handle has been registered (or all were released).
    pub fn is_empty(&self) -> bool {
        self.lock().by_token.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var() -> Value {
        Value::var(livewire_value::Var::new(
            livewire_value::Symbol::parse("user/x"),
            Value::Int(1),
        ))
    }

    #[test]
    fn test_register_then_resolve_returns_same_handle() {
        let table = ForeignTable::new();
        let handle = Value::var(livewire_value::Var::new(
            livewire_value::Symbol::parse("user/x"),
            Value::Int(1),
        ));
        let token = table.register(handle.clone());

        let resolved = table.resolve(&token).expect("token should resolve");
        assert!(resolved.same_identity(&handle));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_release_forgets_token() {
        let table = ForeignTable::new();
        let token = table.register(Value::Nil);
        assert!(table.release(&token));
        assert!(!table.release(&token));
        assert!(table.resolve(&token).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_tokens_are_unique() {
        let table = ForeignTable::new();
        let a = table.register(Value::Nil);
        let b = table.register(Value::Nil);
        assert_ne!(a, b);
    }

    #[test]
    fn test_register_same_handle_reuses_token() {
        let table = ForeignTable::new();
        let handle = var();
        let first = table.register(handle.clone());
        for _ in 0..100 {
            assert_eq!(table.register(handle.clone()), first);
        }
        assert_eq!(table.len(), 1);

        assert_ne!(table.register(var()), first, "a distinct var gets its own token");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_release_then_register_mints_new_token() {
        let table = ForeignTable::new();
        let handle = var();
        let first = table.register(handle.clone());
        assert!(table.release(&first));

        let second = table.register(handle);
        assert_ne!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_release_handle_forgets_its_token() {
        let table = ForeignTable::new();
        let handle = var();
        let token = table.register(handle.clone());

        assert!(table.release_handle(&handle));
        assert!(!table.release_handle(&handle));
        assert!(table.resolve(&token).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_clear_drops_the_tables_hold() {
        let table = ForeignTable::new();
        let handle = var();
        table.register(handle.clone());
        let Value::Var(inner) = &handle else {
            panic!("expected a var");
        };
        assert_eq!(Arc::strong_count(inner), 2);

        table.clear();
        assert!(table.is_empty());
        assert_eq!(Arc::strong_count(inner), 1);
    }

    #[test]
    fn test_clones_share_entries() {
        let table = ForeignTable::new();
        let other = table.clone();
        let token = table.register(Value::Int(3));
        assert_eq!(other.resolve(&token), Some(Value::Int(3)));
    }
}
