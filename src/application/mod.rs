// Application layer - the submission/query surface over the ledger engine.
// Owns persistence and serialises writes; all accounting rules live in domain.

pub mod error;
pub mod service;

pub use error::*;
pub use service::*;
