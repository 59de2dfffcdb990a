//! Market Data Bounded Context
//!
//! Bars as received from the quote source and their validated form.

mod canonical_record;
mod raw_record;
mod rejection;

pub use canonical_record::CanonicalRecord;
pub use raw_record::RawRecord;
pub use rejection::{PriceField, RejectReason, RejectedRecord};
