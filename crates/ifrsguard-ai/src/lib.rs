//! Draft generation: turns a prompt plus retrieved passages into draft text.
//!
//! Generator output is never trusted as fact. Callers score evidence
//! themselves and run every draft through the policy guardrail.

mod extractive;
mod generator;
pub mod prompts;

pub use extractive::ExtractiveGenerator;
pub use generator::{DraftGenerator, GenerateError};

#[cfg(feature = "http")]
mod http;
#[cfg(feature = "http")]
pub use http::HttpGenerator;
