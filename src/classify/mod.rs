//! Turning raw input into structured metadata through a hosted model.
//!
//! [`Classifier`] talks to the Gemini `generateContent` endpoint.
//! [`ConnectivityMonitor`] tracks whether that endpoint is usable.

mod connectivity;
mod gemini;
mod prompt;

pub use connectivity::{Connectivity, ConnectivityMonitor, MonitorHandle};
pub use gemini::{ClassifyError, ClassifyRequest, Classifier, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use prompt::SYSTEM_PROMPT;
