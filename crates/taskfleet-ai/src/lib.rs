pub mod analyzer;
pub mod error;
pub mod notify;

// Re-exports
pub use analyzer::{ErrorContext, GeminiAnalyzer};
pub use error::{Error, Result};
pub use notify::ChatNotifier;
