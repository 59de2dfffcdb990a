//! Shared Value Objects
//!
//! Immutable domain types used across bounded contexts.
//! Value objects are compared by value, not identity.

mod date_range;
mod symbol;

pub use date_range::DateRange;
pub use symbol::Symbol;
