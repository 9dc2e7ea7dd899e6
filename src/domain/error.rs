use thiserror::Error;

use super::{Amount, ExpenseId, Identity};

/// Reasons the ledger engine refuses an operation.
///
/// Every variant is produced before any state is touched, so a rejected
/// write leaves the ledger exactly as it was.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Identity is already registered: {0}")]
    AlreadyRegistered(Identity),

    #[error("Display name must not be empty")]
    EmptyName,

    #[error("Expense label must not be empty")]
    EmptyLabel,

    #[error("Expense must have at least one participant")]
    EmptyParticipantList,

    #[error("Invalid identity: {0:?}")]
    InvalidIdentity(String),

    #[error("Participant appears more than once: {0}")]
    DuplicateParticipant(Identity),

    #[error("Negative amount for participant {identity}: paid {paid}, owed {owed}")]
    NegativeAmount {
        identity: Identity,
        paid: Amount,
        owed: Amount,
    },

    #[error("Participant is not registered: {0}")]
    UnregisteredParticipant(Identity),

    #[error("Expense is not balanced: paid {paid}, owed {owed}")]
    UnbalancedExpense { paid: Amount, owed: Amount },

    #[error("Amount overflow while recording expense")]
    AmountOverflow,

    #[error("Person not found: {0}")]
    PersonNotFound(Identity),

    #[error("Expense not found: {0}")]
    ExpenseNotFound(ExpenseId),

    #[error("Prepared record is stale: expected id {expected}, ledger is at {actual}")]
    StaleCommit { expected: u64, actual: u64 },

    #[error("Stored history is inconsistent: {0}")]
    CorruptHistory(String),
}

impl LedgerError {
    /// True for the not-found family, which callers usually render differently
    /// from validation failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::PersonNotFound(_) | LedgerError::ExpenseNotFound(_)
        )
    }
}
