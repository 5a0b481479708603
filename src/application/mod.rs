// Application layer - use cases and orchestration
// The CLI talks to LedgerService only; the repository stays behind it.

pub mod error;
pub mod reporting;
pub mod service;

pub use error::*;
pub use reporting::*;
pub use service::*;
