use serde::Serialize;

use super::{
    unregistered_participants, Amount, BalanceCalculator, ExpenseLedger, Identity, Registry,
};

/// A running balance that disagrees with the recomputed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceMismatch {
    pub identity: Identity,
    pub running: Amount,
    pub recomputed: Amount,
}

/// Result of checking the ledger's invariants.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub person_count: usize,
    pub expense_count: u64,
    pub has_id_gaps: bool,
    pub mismatches: Vec<BalanceMismatch>,
    /// Sum of every net balance; zero when every expense is balanced
    pub total_net_balance: Amount,
    /// Expenses whose total paid differs from total owed (allowed unless enforced)
    pub unbalanced_expenses: usize,
    /// Participants with history but no registration (allowed unless enforced)
    pub unregistered: Vec<Identity>,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }

    pub(crate) fn add_issue(&mut self, issue: impl Into<String>) {
        self.issues.push(issue.into());
    }
}

/// Build an integrity report from the in-memory components.
pub fn build_integrity_report(
    registry: &Registry,
    expenses: &ExpenseLedger,
    balances: &BalanceCalculator,
) -> IntegrityReport {
    let has_id_gaps = expenses
        .list_expenses()
        .enumerate()
        .any(|(i, e)| e.id != i as u64);

    let mismatches: Vec<BalanceMismatch> = balances
        .diverging(expenses.list_expenses())
        .into_iter()
        .map(|(identity, running, recomputed)| BalanceMismatch {
            identity,
            running,
            recomputed,
        })
        .collect();

    let total_net_balance = balances
        .balances()
        .values()
        .fold(0 as Amount, |acc, b| acc.saturating_add(*b));

    let unbalanced_expenses = expenses
        .list_expenses()
        .filter(|e| !e.is_balanced())
        .count();

    let mut report = IntegrityReport {
        person_count: registry.len(),
        expense_count: expenses.expense_count(),
        has_id_gaps,
        mismatches,
        total_net_balance,
        unbalanced_expenses,
        unregistered: unregistered_participants(registry, expenses.list_expenses()),
        issues: Vec::new(),
    };

    if report.has_id_gaps {
        report.add_issue("Expense ids are not contiguous from 0");
    }
    for m in report.mismatches.clone() {
        report.add_issue(format!(
            "Balance of {} is {} but history sums to {}",
            m.identity, m.running, m.recomputed
        ));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExpenseDraft, Ledger, LedgerConfig};

    const A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    #[test]
    fn test_empty_ledger_is_healthy() {
        let report = build_integrity_report(
            &Registry::new(),
            &ExpenseLedger::new(),
            &BalanceCalculator::new(),
        );
        assert!(report.is_healthy());
        assert_eq!(report.expense_count, 0);
        assert!(!report.has_id_gaps);
    }

    #[test]
    fn test_unbalanced_expenses_are_counted_not_flagged() {
        let mut ledger = Ledger::new(LedgerConfig::default());
        ledger
            .add_expense(&ExpenseDraft::new("Gift").participant(A, 0, 40))
            .unwrap();
        ledger
            .add_expense(
                &ExpenseDraft::new("Lunch")
                    .participant(A, 20, 10)
                    .participant(B, 0, 10),
            )
            .unwrap();

        let report = ledger.verify();
        assert!(report.is_healthy());
        assert_eq!(report.unbalanced_expenses, 1);
        assert_eq!(report.total_net_balance, -40);
    }

    #[test]
    fn test_unregistered_participants_are_listed_not_flagged() {
        let mut ledger = Ledger::new(LedgerConfig::default());
        ledger.register(A, "Alice").unwrap();
        ledger
            .add_expense(
                &ExpenseDraft::new("Taxi")
                    .participant(A, 30, 15)
                    .participant(B, 0, 15),
            )
            .unwrap();

        let report = ledger.verify();
        assert!(report.is_healthy());
        assert_eq!(report.unregistered, vec![Identity::parse(B).unwrap()]);
    }

    #[test]
    fn test_detached_balances_are_reported() {
        let mut ledger = Ledger::new(LedgerConfig::default());
        ledger
            .add_expense(&ExpenseDraft::new("Taxi").participant(A, 30, 0))
            .unwrap();

        // Pair the real history with an empty balance map
        let report = build_integrity_report(
            ledger.registry(),
            &ledger_expenses(&ledger),
            &BalanceCalculator::new(),
        );
        assert!(!report.is_healthy());
        assert_eq!(report.mismatches.len(), 1);
        assert_eq!(report.mismatches[0].recomputed, 30);
        assert_eq!(report.mismatches[0].running, 0);
    }

    fn ledger_expenses(ledger: &Ledger) -> ExpenseLedger {
        let mut copy = ExpenseLedger::new();
        for e in ledger.list_expenses() {
            copy.append(e.clone());
        }
        copy
    }
}
