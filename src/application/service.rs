use std::sync::Arc;

use anyhow::Context;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::domain::{
    Amount, Expense, ExpenseDraft, ExpenseId, Identity, IntegrityReport, Ledger, LedgerConfig,
    Participation, Person,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing high-level operations for the ledger.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
///
/// Writes hold the ledger's write lock while they validate, persist and
/// commit, so they apply one at a time and ids follow that order. Reads take
/// the read lock and only ever see fully committed state.
///
/// Persisting and committing run on a spawned task that owns the write
/// guard. A caller that stops polling a write cannot leave a row in the
/// database that the ledger never committed.
pub struct LedgerService {
    repo: Repository,
    ledger: Arc<RwLock<Ledger>>,
}

/// A registered person together with their current net balance
#[derive(Debug, Clone)]
pub struct PersonBalance {
    pub person: Person,
    pub net_balance: Amount,
}

/// Everything the ledger holds, read under one lock
#[derive(Debug, Clone)]
pub struct LedgerView {
    pub people: Vec<Person>,
    pub expenses: Vec<Expense>,
    /// Every identity with history, sorted by identity
    pub balances: Vec<(Identity, Amount)>,
}

/// One participation resolved against the registry
#[derive(Debug, Clone)]
pub struct ParticipantInfo {
    pub participation: Participation,
    pub display_name: Option<String>,
}

/// An expense with every participant's details, fetched in one read
#[derive(Debug, Clone)]
pub struct ExpenseInfo {
    pub expense: Expense,
    pub participants: Vec<ParticipantInfo>,
}

impl LedgerService {
    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str, config: LedgerConfig) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Self::open(repo, Ledger::new(config)).await
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str, config: LedgerConfig) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Self::open(repo, Ledger::new(config)).await
    }

    /// Load the stored history into `ledger` (which must be empty) and serve it.
    /// Use this to run with a custom identity validator or clock.
    pub async fn open(repo: Repository, ledger: Ledger) -> Result<Self, AppError> {
        let people = repo.list_people().await?;
        let expenses = repo.list_expenses().await?;
        let ledger = ledger.replay(people, expenses)?;

        debug!(
            people = ledger.registry().len(),
            expenses = ledger.expense_count(),
            "loaded ledger history"
        );

        Ok(Self {
            repo,
            ledger: Arc::new(RwLock::new(ledger)),
        })
    }

    // ========================
    // Registration
    // ========================

    /// Register a new person.
    pub async fn register(&self, identity: &str, display_name: &str) -> Result<Person, AppError> {
        let mut ledger = Arc::clone(&self.ledger).write_owned().await;

        let pending = ledger
            .prepare_registration(identity, display_name)
            .inspect_err(|err| debug!(identity, %err, "registration rejected"))?;

        let repo = self.repo.clone();
        let person = tokio::spawn(async move {
            repo.save_person(pending.person(), ledger.registry().len())
                .await?;
            Ok::<_, AppError>(ledger.commit_registration(pending)?)
        })
        .await
        .context("Registration task failed")??;

        info!(identity = %person.identity, name = %person.display_name, "registered person");
        Ok(person)
    }

    /// Get a registered person.
    pub async fn get_person(&self, identity: &str) -> Result<Person, AppError> {
        let ledger = self.ledger.read().await;
        let identity = ledger.parse_identity(identity)?;
        Ok(ledger.get_person(&identity)?.clone())
    }

    /// List everyone in registration order.
    pub async fn list_registered(&self) -> Vec<Person> {
        self.ledger.read().await.list_registered().cloned().collect()
    }

    /// Registered people with their balances, in registration order.
    pub async fn people_with_balances(&self) -> Vec<PersonBalance> {
        let ledger = self.ledger.read().await;
        ledger
            .list_registered()
            .map(|person| PersonBalance {
                net_balance: ledger.net_balance(&person.identity),
                person: person.clone(),
            })
            .collect()
    }

    // ========================
    // Expenses
    // ========================

    /// Record a shared expense and return its id.
    pub async fn add_expense(&self, draft: &ExpenseDraft) -> Result<ExpenseId, AppError> {
        let mut ledger = Arc::clone(&self.ledger).write_owned().await;

        let pending = ledger
            .prepare_expense(draft)
            .inspect_err(|err| debug!(label = draft.label(), %err, "expense rejected"))?;
        let participants = pending.expense().participants.len();

        let repo = self.repo.clone();
        let id = tokio::spawn(async move {
            repo.save_expense(pending.expense()).await?;
            Ok::<_, AppError>(ledger.commit_expense(pending)?)
        })
        .await
        .context("Expense task failed")??;

        info!(id, participants, "recorded expense");
        Ok(id)
    }

    pub async fn expense_count(&self) -> u64 {
        self.ledger.read().await.expense_count()
    }

    pub async fn get_expense(&self, id: ExpenseId) -> Result<Expense, AppError> {
        Ok(self.ledger.read().await.get_expense(id)?.clone())
    }

    /// Expense plus every participant's name, taken from one consistent read.
    pub async fn get_expense_info(&self, id: ExpenseId) -> Result<ExpenseInfo, AppError> {
        let ledger = self.ledger.read().await;
        let expense = ledger.get_expense(id)?.clone();
        let participants = ledger
            .participations_of(id)?
            .iter()
            .map(|p| ParticipantInfo {
                display_name: ledger
                    .get_person(&p.identity)
                    .ok()
                    .map(|person| person.display_name.clone()),
                participation: p.clone(),
            })
            .collect();
        Ok(ExpenseInfo {
            expense,
            participants,
        })
    }

    /// Snapshot of all committed expenses in commit order.
    ///
    /// Expenses committed after this call returns are not included; call again
    /// to observe them.
    pub async fn list_expenses(&self) -> Vec<Expense> {
        self.ledger.read().await.list_expenses().cloned().collect()
    }

    /// Consistent copy of people, expenses and balances.
    pub async fn view(&self) -> LedgerView {
        let ledger = self.ledger.read().await;
        let mut balances: Vec<_> = ledger
            .balances()
            .balances()
            .iter()
            .map(|(identity, balance)| (identity.clone(), *balance))
            .collect();
        balances.sort();
        LedgerView {
            people: ledger.list_registered().cloned().collect(),
            expenses: ledger.list_expenses().cloned().collect(),
            balances,
        }
    }

    // ========================
    // Balances
    // ========================

    /// Net balance for an identity; zero if it never took part in an expense.
    pub async fn net_balance(&self, identity: &str) -> Result<Amount, AppError> {
        let ledger = self.ledger.read().await;
        let identity = ledger.parse_identity(identity)?;
        Ok(ledger.net_balance(&identity))
    }

    // ========================
    // Integrity
    // ========================

    /// Check the in-memory ledger against itself and against the database.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let ledger = self.ledger.read().await;
        let mut report = ledger.verify();

        let stats = self.repo.get_integrity_stats().await?;
        if stats.expense_count != report.expense_count as i64 {
            report.add_issue(format!(
                "Database holds {} expenses, ledger holds {}",
                stats.expense_count, report.expense_count
            ));
        }
        if stats.person_count != report.person_count as i64 {
            report.add_issue(format!(
                "Database holds {} people, ledger holds {}",
                stats.person_count, report.person_count
            ));
        }
        if stats.has_id_gaps {
            report.add_issue("Stored expense ids are not contiguous from 0");
        }
        if stats.empty_expenses > 0 {
            report.add_issue(format!(
                "{} stored expenses have no participants",
                stats.empty_expenses
            ));
        }
        if stats.invalid_amounts > 0 {
            report.add_issue(format!(
                "{} stored participations have negative amounts",
                stats.invalid_amounts
            ));
        }

        let stored = self.repo.compute_all_net_balances().await?;
        for (identity, running) in ledger.balances().balances() {
            let in_db = stored.get(identity.as_str()).copied().unwrap_or(0);
            if in_db != *running {
                report.add_issue(format!(
                    "Balance of {} is {} but the database sums to {}",
                    identity, running, in_db
                ));
            }
        }
        for (identity, in_db) in &stored {
            let known = ledger
                .parse_identity(identity)
                .is_ok_and(|id| ledger.balances().balances().contains_key(&id));
            if !known && *in_db != 0 {
                report.add_issue(format!(
                    "Database has balance {} for {} which the ledger does not know",
                    in_db, identity
                ));
            }
        }

        if !report.is_healthy() {
            warn!(issues = report.issues.len(), "integrity check found issues");
        }
        Ok(report)
    }
}
