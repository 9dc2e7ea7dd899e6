use chrono::{DateTime, Utc};
use std::collections::HashSet;

use super::{
    build_integrity_report, Amount, BalanceCalculator, Expense, ExpenseDraft, ExpenseId,
    ExpenseLedger, HexAddressValidator, Identity, IdentityValidator, IntegrityReport,
    LedgerConfig, LedgerError, Participation, ParticipationEntry, Person, Registry,
};

/// Source of commit instants.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

impl<F> Clock for F
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn now(&self) -> DateTime<Utc> {
        self()
    }
}

/// A registration that passed validation but is not yet part of the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPerson {
    person: Person,
    position: usize,
}

impl PendingPerson {
    pub fn person(&self) -> &Person {
        &self.person
    }
}

/// An expense that passed validation and has its id and timestamp assigned,
/// but is not yet part of the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingExpense {
    expense: Expense,
}

impl PendingExpense {
    pub fn expense(&self) -> &Expense {
        &self.expense
    }
}

/// Persisted registration, as read back from storage.
#[derive(Debug, Clone)]
pub struct PersonRecord {
    pub identity: String,
    pub display_name: String,
    pub registered_at: DateTime<Utc>,
}

/// Persisted expense, as read back from storage.
#[derive(Debug, Clone)]
pub struct ExpenseRecord {
    pub id: ExpenseId,
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub participants: Vec<ParticipationEntry>,
}

/// The ledger state machine: registry, expense history and running balances.
///
/// `register` and `add_expense` are the only write paths. Each one validates
/// completely before touching state, so a failed call changes nothing.
/// Writes need `&mut self`, which keeps them exclusive with each other and with
/// any borrow handed out by the read methods.
pub struct Ledger {
    config: LedgerConfig,
    validator: Box<dyn IdentityValidator>,
    clock: Box<dyn Clock>,
    registry: Registry,
    expenses: ExpenseLedger,
    balances: BalanceCalculator,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            validator: Box::new(HexAddressValidator),
            clock: Box::new(SystemClock),
            registry: Registry::new(),
            expenses: ExpenseLedger::new(),
            balances: BalanceCalculator::new(),
        }
    }

    pub fn with_validator(mut self, validator: impl IdentityValidator + 'static) -> Self {
        self.validator = Box::new(validator);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Check an identity against this ledger's validator.
    pub fn parse_identity(&self, raw: &str) -> Result<Identity, LedgerError> {
        self.validator.validate(raw)
    }

    // ========================
    // Registration
    // ========================

    pub fn prepare_registration(
        &self,
        identity: &str,
        display_name: &str,
    ) -> Result<PendingPerson, LedgerError> {
        let identity = self.validator.validate(identity)?;
        let name = self.registry.check_registration(&identity, display_name)?;
        Ok(PendingPerson {
            person: Person::new(identity, name, self.clock.now()),
            position: self.registry.len(),
        })
    }

    pub fn commit_registration(&mut self, pending: PendingPerson) -> Result<Person, LedgerError> {
        if pending.position != self.registry.len() {
            return Err(LedgerError::StaleCommit {
                expected: pending.position as u64,
                actual: self.registry.len() as u64,
            });
        }
        self.registry.insert(pending.person.clone());
        Ok(pending.person)
    }

    /// Register a new person. Fails if the identity is malformed, already
    /// registered, or the name is blank.
    pub fn register(&mut self, identity: &str, display_name: &str) -> Result<Person, LedgerError> {
        let pending = self.prepare_registration(identity, display_name)?;
        self.commit_registration(pending)
    }

    pub fn get_person(&self, identity: &Identity) -> Result<&Person, LedgerError> {
        self.registry.get_person(identity)
    }

    pub fn list_registered(&self) -> impl Iterator<Item = &Person> + '_ {
        self.registry.list_registered()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ========================
    // Expenses
    // ========================

    pub fn prepare_expense(&self, draft: &ExpenseDraft) -> Result<PendingExpense, LedgerError> {
        let validated =
            ExpenseLedger::validate(draft, self.validator.as_ref(), &self.registry, self.config)?;
        let expense = Expense {
            id: self.expenses.next_id(),
            label: validated.label,
            timestamp: self.clock.now(),
            participants: validated.participants,
        };
        self.balances.check_apply(&expense)?;
        Ok(PendingExpense { expense })
    }

    pub fn commit_expense(&mut self, pending: PendingExpense) -> Result<ExpenseId, LedgerError> {
        let expected = pending.expense.id;
        let actual = self.expenses.next_id();
        if expected != actual {
            return Err(LedgerError::StaleCommit { expected, actual });
        }
        // Same id means no expense committed since prepare, so the overflow
        // check done there still holds.
        self.balances.apply(&pending.expense);
        self.expenses.append(pending.expense);
        Ok(expected)
    }

    /// Record a shared expense and return its id.
    pub fn add_expense(&mut self, draft: &ExpenseDraft) -> Result<ExpenseId, LedgerError> {
        let pending = self.prepare_expense(draft)?;
        self.commit_expense(pending)
    }

    pub fn expense_count(&self) -> u64 {
        self.expenses.expense_count()
    }

    pub fn get_expense(&self, id: ExpenseId) -> Result<&Expense, LedgerError> {
        self.expenses.get_expense(id)
    }

    /// Committed expenses in commit order. The borrow prevents commits while
    /// the iterator is alive.
    pub fn list_expenses(&self) -> impl ExactSizeIterator<Item = &Expense> + '_ {
        self.expenses.list_expenses()
    }

    pub fn participations_of(&self, id: ExpenseId) -> Result<&[Participation], LedgerError> {
        self.expenses.participations_of(id)
    }

    // ========================
    // Balances
    // ========================

    /// Net balance of `identity`; zero for identities with no history.
    pub fn net_balance(&self, identity: &Identity) -> Amount {
        self.balances.net_balance(identity)
    }

    pub fn balances(&self) -> &BalanceCalculator {
        &self.balances
    }

    // ========================
    // History
    // ========================

    /// Rebuild a ledger from persisted history. Submission policies are not
    /// re-applied, but every structural invariant is.
    pub fn restore(
        config: LedgerConfig,
        people: impl IntoIterator<Item = PersonRecord>,
        expenses: impl IntoIterator<Item = ExpenseRecord>,
    ) -> Result<Self, LedgerError> {
        Self::new(config).replay(people, expenses)
    }

    /// Replay history into an empty ledger (use after `with_validator`).
    pub fn replay(
        mut self,
        people: impl IntoIterator<Item = PersonRecord>,
        expenses: impl IntoIterator<Item = ExpenseRecord>,
    ) -> Result<Self, LedgerError> {
        for record in people {
            let identity = self.validator.validate(&record.identity).map_err(corrupt)?;
            let name = self
                .registry
                .check_registration(&identity, &record.display_name)
                .map_err(corrupt)?;
            self.registry
                .insert(Person::new(identity, name, record.registered_at));
        }

        for record in expenses {
            let expense = self.restore_expense(record)?;
            self.balances.check_apply(&expense).map_err(corrupt)?;
            self.balances.apply(&expense);
            self.expenses.append(expense);
        }

        Ok(self)
    }

    fn restore_expense(&self, record: ExpenseRecord) -> Result<Expense, LedgerError> {
        let next = self.expenses.next_id();
        if record.id != next {
            return Err(LedgerError::CorruptHistory(format!(
                "expected expense {next}, found {}",
                record.id
            )));
        }

        // Structural rules only: submission policies were checked at write time
        let draft = ExpenseDraft::new(record.label).with_entries(record.participants);
        let validated = ExpenseLedger::validate(
            &draft,
            self.validator.as_ref(),
            &self.registry,
            LedgerConfig::default(),
        )
        .map_err(corrupt)?;

        Ok(Expense {
            id: record.id,
            label: validated.label,
            timestamp: record.timestamp,
            participants: validated.participants,
        })
    }

    /// Cross-check the running balances against a full recomputation.
    pub fn verify(&self) -> IntegrityReport {
        build_integrity_report(&self.registry, &self.expenses, &self.balances)
    }
}

fn corrupt(err: LedgerError) -> LedgerError {
    LedgerError::CorruptHistory(err.to_string())
}

/// Identities that occur in `expenses` but are not registered.
pub fn unregistered_participants<'a>(
    registry: &Registry,
    expenses: impl IntoIterator<Item = &'a Expense>,
) -> Vec<Identity> {
    let mut seen = HashSet::new();
    expenses
        .into_iter()
        .flat_map(|e| e.participants.iter())
        .filter(|p| !registry.is_registered(&p.identity))
        .filter(|p| seen.insert(p.identity.clone()))
        .map(|p| p.identity.clone())
        .collect()
}
