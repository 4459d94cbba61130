//! Host value model for Livewire.
//!
//! This crate is the data model that the codec converts to and from
//! bytes. It stands in for a dynamic language's runtime values:
//!
//! - **Scalars**: nil, booleans, numbers (including big integers,
//!   big decimals and ratios), characters, strings, symbols, keywords,
//!   regexes and timestamps.
//! - **Collections** ([`Value::List`], [`Value::Vector`], [`Value::Set`],
//!   [`Value::Map`]): immutable, shared through `Arc`, so they carry an
//!   identity that the codec preserves across the wire.
//! - **Live handles** ([`Var`], [`NativeFn`]): running state that can
//!   only travel as an opaque reference.

mod error;
mod handle;
mod name;
mod number;
mod value;

pub use error::ValueError;
pub use handle::{NativeFn, Var};
pub use name::{Keyword, Symbol};
pub use number::BigFloat;
pub use value::{CollectionKind, Regex, Value};
