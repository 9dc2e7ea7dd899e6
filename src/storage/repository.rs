use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;

use crate::domain::{Amount, Expense, ExpenseRecord, ParticipationEntry, Person, PersonRecord};

use super::MIGRATION_001_INITIAL;

/// Statistics for ledger integrity verification, computed in SQL.
#[derive(Debug, Clone)]
pub struct IntegrityStats {
    pub person_count: i64,
    pub expense_count: i64,
    pub has_id_gaps: bool,
    pub empty_expenses: i64,
    pub invalid_amounts: i64,
}

/// Repository for persisting and querying people and expenses.
///
/// Rows are only ever inserted; the schema refuses updates and deletes.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given URL.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // People
    // ========================

    /// Save a newly registered person at the given registration position.
    pub async fn save_person(&self, person: &Person, position: usize) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO people (identity, position, display_name, registered_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(person.identity.as_str())
        .bind(i64::try_from(position).context("Registration position out of range")?)
        .bind(&person.display_name)
        .bind(person.registered_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save person")?;
        Ok(())
    }

    /// List all people in registration order.
    pub async fn list_people(&self) -> Result<Vec<PersonRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT identity, display_name, registered_at
            FROM people
            ORDER BY position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list people")?;

        rows.iter().map(Self::row_to_person).collect()
    }

    fn row_to_person(row: &sqlx::sqlite::SqliteRow) -> Result<PersonRecord> {
        let registered_at_str: String = row.get("registered_at");
        Ok(PersonRecord {
            identity: row.get("identity"),
            display_name: row.get("display_name"),
            registered_at: parse_timestamp(&registered_at_str)
                .context("Invalid registered_at timestamp")?,
        })
    }

    // ========================
    // Expenses
    // ========================

    /// Save a committed expense and all of its participations in one transaction.
    pub async fn save_expense(&self, expense: &Expense) -> Result<()> {
        let expense_id = i64::try_from(expense.id).context("Expense id out of range")?;
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO expenses (id, label, timestamp)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(expense_id)
        .bind(&expense.label)
        .bind(expense.timestamp.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save expense")?;

        for (position, p) in expense.participants.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO participations (expense_id, position, identity, amount_paid, amount_owed)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(expense_id)
            .bind(position as i64)
            .bind(p.identity.as_str())
            .bind(p.amount_paid)
            .bind(p.amount_owed)
            .execute(&mut *tx)
            .await
            .context("Failed to save participation")?;
        }

        tx.commit().await.context("Failed to commit expense")?;
        Ok(())
    }

    /// List all expenses with their participations, ordered by id.
    /// Reads the whole history in two queries.
    pub async fn list_expenses(&self) -> Result<Vec<ExpenseRecord>> {
        let expense_rows = sqlx::query(
            r#"
            SELECT id, label, timestamp
            FROM expenses
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list expenses")?;

        let participation_rows = sqlx::query(
            r#"
            SELECT expense_id, identity, amount_paid, amount_owed
            FROM participations
            ORDER BY expense_id, position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list participations")?;

        let mut by_expense: HashMap<i64, Vec<ParticipationEntry>> = HashMap::new();
        for row in &participation_rows {
            by_expense
                .entry(row.get("expense_id"))
                .or_default()
                .push(ParticipationEntry {
                    identity: row.get("identity"),
                    amount_paid: row.get("amount_paid"),
                    amount_owed: row.get("amount_owed"),
                });
        }

        expense_rows
            .iter()
            .map(|row| {
                let id: i64 = row.get("id");
                let timestamp_str: String = row.get("timestamp");
                Ok(ExpenseRecord {
                    id: u64::try_from(id).context("Invalid expense id")?,
                    label: row.get("label"),
                    timestamp: parse_timestamp(&timestamp_str).context("Invalid timestamp")?,
                    participants: by_expense.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }

    /// Compute every identity's net balance using SQL aggregation.
    pub async fn compute_all_net_balances(&self) -> Result<HashMap<String, Amount>> {
        let rows = sqlx::query(
            r#"
            SELECT identity, SUM(amount_paid - amount_owed) as balance
            FROM participations
            GROUP BY identity
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute net balances")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("identity"), row.get("balance")))
            .collect())
    }

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let person_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM people")
            .fetch_one(&self.pool)
            .await?
            .get("count");

        let id_check = sqlx::query(
            r#"
            SELECT
                MIN(id) as min_id,
                MAX(id) as max_id,
                COUNT(*) as count
            FROM expenses
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let min_id: Option<i64> = id_check.get("min_id");
        let max_id: Option<i64> = id_check.get("max_id");
        let expense_count: i64 = id_check.get("count");

        let has_id_gaps = match (min_id, max_id) {
            (Some(min), Some(max)) => min != 0 || (max - min + 1) != expense_count,
            _ => false,
        };

        let empty_expenses: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM expenses e
            WHERE NOT EXISTS (SELECT 1 FROM participations p WHERE p.expense_id = e.id)
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        let invalid_amounts: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) as count
            FROM participations
            WHERE amount_paid < 0 OR amount_owed < 0
            "#,
        )
        .fetch_one(&self.pool)
        .await?
        .get("count");

        Ok(IntegrityStats {
            person_count,
            expense_count,
            has_id_gaps,
            empty_expenses,
            invalid_amounts,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}
