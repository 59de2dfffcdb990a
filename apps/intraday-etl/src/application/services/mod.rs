//! Application Services
//!
//! The pipeline stages and the failure-handling machinery they share.

mod decision_engine;
mod error_classifier;
mod extractor;
mod loader;
mod retry_support;
mod transformer;
mod work_list;

pub use decision_engine::DecisionEngine;
pub use error_classifier::{ClassifierConfig, ErrorClassifier, normalize_answer};
pub use extractor::{ExtractionError, Extractor};
pub use loader::{LoadError, Loader};
pub use transformer::{TransformOutput, Transformer};
pub use work_list::{WorkListGenerator, WorkListSpec};
