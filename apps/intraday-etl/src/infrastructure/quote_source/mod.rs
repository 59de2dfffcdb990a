//! Quote Source Adapters
//!
//! Implementations of [`QuoteSourcePort`](crate::application::ports::QuoteSourcePort).

mod api_types;
mod http;
mod in_memory;

pub use http::{HttpQuoteSource, HttpQuoteSourceConfig};
pub use in_memory::InMemoryQuoteSource;
