//! Cross-cutting concerns used by every layer.

pub mod errors;
pub mod shutdown;

pub use errors::{AppError, DomainError, StoreError};
pub use shutdown::{listen_for_shutdown_signals, ShutdownSignal};
