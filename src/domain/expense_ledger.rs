use std::collections::HashSet;

use super::{
    Amount, Expense, ExpenseDraft, ExpenseId, IdentityValidator, LedgerError, Participation,
    Registry,
};

/// Submission policies beyond the structural rules every expense obeys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LedgerConfig {
    /// Reject participants that have no registered Person.
    pub require_registered: bool,
    /// Reject expenses whose total paid differs from total owed.
    pub require_balanced: bool,
}

/// A draft that passed validation, ready to be stamped and appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ValidatedExpense {
    pub label: String,
    pub participants: Vec<Participation>,
}

/// The append-only history of committed expenses.
#[derive(Debug, Clone, Default)]
pub struct ExpenseLedger {
    expenses: Vec<Expense>,
}

impl ExpenseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate a draft. Checks run in a fixed order and the first failure wins:
    /// label, participant list, identities, duplicates, amounts, then the
    /// optional registration and balance policies, then overflow of the totals.
    pub(crate) fn validate(
        draft: &ExpenseDraft,
        validator: &dyn IdentityValidator,
        registry: &Registry,
        config: LedgerConfig,
    ) -> Result<ValidatedExpense, LedgerError> {
        let label = draft.label().trim();
        if label.is_empty() {
            return Err(LedgerError::EmptyLabel);
        }

        let entries = draft.entries();
        if entries.is_empty() {
            return Err(LedgerError::EmptyParticipantList);
        }

        let identities = entries
            .iter()
            .map(|e| validator.validate(&e.identity))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = HashSet::with_capacity(identities.len());
        for identity in &identities {
            if !seen.insert(identity) {
                return Err(LedgerError::DuplicateParticipant(identity.clone()));
            }
        }

        let participants: Vec<Participation> = identities
            .into_iter()
            .zip(entries)
            .map(|(identity, entry)| Participation {
                identity,
                amount_paid: entry.amount_paid,
                amount_owed: entry.amount_owed,
            })
            .collect();

        if let Some(p) = participants
            .iter()
            .find(|p| p.amount_paid < 0 || p.amount_owed < 0)
        {
            return Err(LedgerError::NegativeAmount {
                identity: p.identity.clone(),
                paid: p.amount_paid,
                owed: p.amount_owed,
            });
        }

        if config.require_registered {
            if let Some(p) = participants
                .iter()
                .find(|p| !registry.is_registered(&p.identity))
            {
                return Err(LedgerError::UnregisteredParticipant(p.identity.clone()));
            }
        }

        let paid = checked_total(participants.iter().map(|p| p.amount_paid))?;
        let owed = checked_total(participants.iter().map(|p| p.amount_owed))?;

        if config.require_balanced && paid != owed {
            return Err(LedgerError::UnbalancedExpense { paid, owed });
        }

        Ok(ValidatedExpense {
            label: label.to_string(),
            participants,
        })
    }

    /// Id the next committed expense will receive.
    pub fn next_id(&self) -> ExpenseId {
        self.expenses.len() as ExpenseId
    }

    pub(crate) fn append(&mut self, expense: Expense) {
        debug_assert_eq!(expense.id, self.next_id());
        self.expenses.push(expense);
    }

    pub fn expense_count(&self) -> u64 {
        self.expenses.len() as u64
    }

    pub fn get_expense(&self, id: ExpenseId) -> Result<&Expense, LedgerError> {
        usize::try_from(id)
            .ok()
            .and_then(|i| self.expenses.get(i))
            .ok_or(LedgerError::ExpenseNotFound(id))
    }

    /// Committed expenses in commit order.
    pub fn list_expenses(&self) -> impl ExactSizeIterator<Item = &Expense> + '_ {
        self.expenses.iter()
    }

    /// All participations of one expense in submission order.
    pub fn participations_of(&self, id: ExpenseId) -> Result<&[Participation], LedgerError> {
        self.get_expense(id).map(|e| e.participants.as_slice())
    }
}

fn checked_total(mut amounts: impl Iterator<Item = Amount>) -> Result<Amount, LedgerError> {
    amounts.try_fold(0 as Amount, |acc, a| {
        acc.checked_add(a).ok_or(LedgerError::AmountOverflow)
    })
}
