//! Application Ports (Driven)
//!
//! Ports define how the pipeline uses external systems: the quote source,
//! the record and checkpoint stores, the decision log, the alerting channel
//! and the optional inference classifier.

mod checkpoint_store_port;
mod decision_log_port;
mod inference_port;
mod notifier_port;
mod quote_source_port;
mod record_store_port;

pub use checkpoint_store_port::CheckpointStorePort;
pub use decision_log_port::DecisionLogPort;
#[cfg(test)]
pub use inference_port::MockInferencePort;
pub use inference_port::{InferenceError, InferencePort};
pub use notifier_port::{EscalationNotice, Notification, NotifierPort, NotifyError, NoOpNotifier};
pub use quote_source_port::{QuoteSourcePort, SourceError};
pub use record_store_port::{LoadResult, RecordStorePort, StoreError};
