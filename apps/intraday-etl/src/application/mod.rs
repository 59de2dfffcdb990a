//! Application Layer
//!
//! The application layer orchestrates domain logic through use cases.
//! It defines:
//!
//! - **Ports**: Interfaces for interacting with external systems
//! - **Services**: The pipeline stages and the decision engine
//! - **Use Cases**: The pipeline run itself
//! - **DTOs**: Run summaries handed to notifiers and callers

pub mod dto;
pub mod ports;
pub mod services;
pub mod use_cases;

pub use dto::*;
pub use ports::*;
pub use use_cases::*;
