use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Amount, Identity};

/// Sequential expense number, assigned by the ledger at commit time.
pub type ExpenseId = u64;

/// One participant's share of an expense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participation {
    pub identity: Identity,
    /// What this participant put in (minor units, never negative)
    pub amount_paid: Amount,
    /// What this participant's share of the cost is (minor units, never negative)
    pub amount_owed: Amount,
}

impl Participation {
    /// Contribution of this participation to the participant's net balance.
    pub fn net(&self) -> Amount {
        self.amount_paid - self.amount_owed
    }
}

/// A committed shared expense. Expenses are immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Expense {
    pub id: ExpenseId,
    pub label: String,
    /// Commit instant, stamped by the ledger
    pub timestamp: DateTime<Utc>,
    pub participants: Vec<Participation>,
}

impl Expense {
    pub fn total_paid(&self) -> Amount {
        self.participants.iter().map(|p| p.amount_paid).sum()
    }

    pub fn total_owed(&self) -> Amount {
        self.participants.iter().map(|p| p.amount_owed).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_paid() == self.total_owed()
    }

    pub fn participation(&self, identity: &Identity) -> Option<&Participation> {
        self.participants.iter().find(|p| &p.identity == identity)
    }
}

/// Raw, not yet validated participant line as submitted by a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipationEntry {
    pub identity: String,
    pub amount_paid: Amount,
    pub amount_owed: Amount,
}

/// Immutable description of an expense to be submitted.
///
/// Built up front and handed to the ledger as a whole; the ledger either
/// commits all of it or none of it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExpenseDraft {
    label: String,
    entries: Vec<ParticipationEntry>,
}

impl ExpenseDraft {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: Vec::new(),
        }
    }

    pub fn participant(
        mut self,
        identity: impl Into<String>,
        amount_paid: Amount,
        amount_owed: Amount,
    ) -> Self {
        self.entries.push(ParticipationEntry {
            identity: identity.into(),
            amount_paid,
            amount_owed,
        });
        self
    }

    pub fn with_entries(mut self, entries: impl IntoIterator<Item = ParticipationEntry>) -> Self {
        self.entries.extend(entries);
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn entries(&self) -> &[ParticipationEntry] {
        &self.entries
    }
}
