//! Inference Adapters
//!
//! Text-generation endpoint used by the error classifier.

mod http;

pub use http::{HttpInferenceClient, HttpInferenceConfig};
