use proptest::prelude::*;
use sharetab::domain::{
    Amount, ExpenseDraft, Identity, Ledger, LedgerConfig, compute_all_net_balances,
    compute_net_balance,
};

const POOL: [&str; 5] = [
    "0x1111111111111111111111111111111111111111",
    "0x2222222222222222222222222222222222222222",
    "0x3333333333333333333333333333333333333333",
    "0x4444444444444444444444444444444444444444",
    "0x5555555555555555555555555555555555555555",
];

/// One submission: a label (possibly blank) and participant lines drawn from
/// a small pool so duplicates happen, with amounts that are sometimes negative.
fn draft_strategy() -> impl Strategy<Value = ExpenseDraft> {
    let line = (0..POOL.len(), -50i64..10_000, -50i64..10_000);
    (
        prop_oneof![Just(String::new()), "[a-z]{1,12}"],
        prop::collection::vec(line, 0..5),
    )
        .prop_map(|(label, lines)| {
            lines
                .into_iter()
                .fold(ExpenseDraft::new(label), |draft, (i, paid, owed)| {
                    draft.participant(POOL[i], paid, owed)
                })
        })
}

fn snapshot(ledger: &Ledger) -> (u64, Vec<Amount>) {
    let balances = POOL
        .iter()
        .map(|raw| ledger.net_balance(&Identity::parse(raw).unwrap()))
        .collect();
    (ledger.expense_count(), balances)
}

proptest! {
    #[test]
    fn running_balances_always_match_recomputation(
        drafts in prop::collection::vec(draft_strategy(), 1..40)
    ) {
        let mut ledger = Ledger::new(LedgerConfig::default());

        for draft in &drafts {
            let _ = ledger.add_expense(draft);

            let recomputed = compute_all_net_balances(ledger.list_expenses());
            for raw in POOL {
                let identity = Identity::parse(raw).unwrap();
                prop_assert_eq!(
                    ledger.net_balance(&identity),
                    recomputed.get(&identity).copied().unwrap_or(0)
                );
                prop_assert_eq!(
                    ledger.net_balance(&identity),
                    compute_net_balance(&identity, ledger.list_expenses())
                );
            }
        }
        prop_assert!(ledger.verify().is_healthy());
    }

    #[test]
    fn failed_submissions_change_nothing(
        drafts in prop::collection::vec(draft_strategy(), 1..40)
    ) {
        let mut ledger = Ledger::new(LedgerConfig::default());

        for draft in &drafts {
            let before = snapshot(&ledger);
            match ledger.add_expense(draft) {
                Ok(id) => {
                    prop_assert_eq!(id, before.0);
                    prop_assert_eq!(ledger.expense_count(), before.0 + 1);
                }
                Err(_) => prop_assert_eq!(snapshot(&ledger), before),
            }
        }
    }

    #[test]
    fn ids_are_assigned_in_commit_order_without_gaps(
        drafts in prop::collection::vec(draft_strategy(), 1..40)
    ) {
        let mut ledger = Ledger::new(LedgerConfig::default());
        let committed: Vec<u64> = drafts
            .iter()
            .filter_map(|draft| ledger.add_expense(draft).ok())
            .collect();

        let expected: Vec<u64> = (0..committed.len() as u64).collect();
        prop_assert_eq!(&committed, &expected);
        let listed: Vec<u64> = ledger.list_expenses().map(|e| e.id).collect();
        prop_assert_eq!(listed, expected);
    }
}
