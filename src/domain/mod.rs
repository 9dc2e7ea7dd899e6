mod balance;
mod engine;
mod error;
mod expense;
mod expense_ledger;
mod identity;
mod integrity;
mod money;
mod person;
mod registry;

pub use balance::*;
pub use engine::*;
pub use error::*;
pub use expense::*;
pub use expense_ledger::*;
pub use identity::*;
pub use integrity::*;
pub use money::*;
pub use person::*;
pub use registry::*;
