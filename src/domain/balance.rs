use std::collections::HashMap;

use super::{Amount, Expense, Identity, LedgerError};

/// Compute the net balance for a single identity from an expense history.
/// Net balance = sum of (paid - owed) over every participation of that identity.
pub fn compute_net_balance<'a>(
    identity: &Identity,
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> Amount {
    expenses
        .into_iter()
        .filter_map(|expense| expense.participation(identity))
        .map(|p| p.net())
        .sum()
}

/// Compute net balances for every identity that appears in the history.
/// Identities that never participated are absent (balance = 0).
pub fn compute_all_net_balances<'a>(
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> HashMap<Identity, Amount> {
    let mut balances: HashMap<Identity, Amount> = HashMap::new();

    for expense in expenses {
        for p in &expense.participants {
            *balances.entry(p.identity.clone()).or_insert(0) += p.net();
        }
    }

    balances
}

/// Running net balances, updated as each expense commits.
#[derive(Debug, Clone, Default)]
pub struct BalanceCalculator {
    balances: HashMap<Identity, Amount>,
}

impl BalanceCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Net balance of `identity`; zero if it never took part in an expense.
    pub fn net_balance(&self, identity: &Identity) -> Amount {
        self.balances.get(identity).copied().unwrap_or(0)
    }

    pub fn balances(&self) -> &HashMap<Identity, Amount> {
        &self.balances
    }

    /// Verify that applying `expense` cannot overflow any balance.
    pub(crate) fn check_apply(&self, expense: &Expense) -> Result<(), LedgerError> {
        for p in &expense.participants {
            self.net_balance(&p.identity)
                .checked_add(p.net())
                .ok_or(LedgerError::AmountOverflow)?;
        }
        Ok(())
    }

    /// Fold a committed expense into the running totals.
    /// Callers must have passed [`check_apply`](Self::check_apply) first.
    pub(crate) fn apply(&mut self, expense: &Expense) {
        for p in &expense.participants {
            *self.balances.entry(p.identity.clone()).or_insert(0) += p.net();
        }
    }

    /// Identities whose running balance disagrees with a recomputation
    /// from `expenses`, with (running, recomputed) values.
    pub fn diverging<'a>(
        &self,
        expenses: impl IntoIterator<Item = &'a Expense>,
    ) -> Vec<(Identity, Amount, Amount)> {
        let recomputed = compute_all_net_balances(expenses);
        let mut mismatches: Vec<_> = self
            .balances
            .keys()
            .chain(recomputed.keys())
            .filter_map(|identity| {
                let running = self.net_balance(identity);
                let expected = recomputed.get(identity).copied().unwrap_or(0);
                (running != expected).then(|| (identity.clone(), running, expected))
            })
            .collect();
        mismatches.sort();
        mismatches.dedup();
        mismatches
    }
}
