//! Logging setup and stage timing.

pub mod logging;
mod timer;

pub use logging::{LoggingError, LoggingGuard};
pub use timer::SpanTimer;
