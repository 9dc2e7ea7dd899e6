use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;

use crate::application::LedgerService;
use crate::domain::{Amount, Expense, Identity, Person};

/// Balance line of a full snapshot
#[derive(Debug, Clone, Serialize)]
pub struct BalanceSnapshot {
    pub identity: Identity,
    pub display_name: Option<String>,
    pub net_balance: Amount,
}

/// Full ledger snapshot for JSON export
#[derive(Debug, Clone, Serialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub people: Vec<Person>,
    pub expenses: Vec<Expense>,
    pub balances: Vec<BalanceSnapshot>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a LedgerService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService) -> Self {
        Self { service }
    }

    /// Export expenses to CSV, one row per participation
    pub async fn export_expenses_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let expenses = self.service.list_expenses().await;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "expense_id",
            "timestamp",
            "label",
            "identity",
            "amount_paid",
            "amount_owed",
        ])?;

        for expense in &expenses {
            for p in &expense.participants {
                csv_writer.write_record([
                    expense.id.to_string(),
                    expense.timestamp.to_rfc3339(),
                    expense.label.clone(),
                    p.identity.to_string(),
                    p.amount_paid.to_string(),
                    p.amount_owed.to_string(),
                ])?;
            }
        }

        csv_writer.flush()?;
        Ok(expenses.len())
    }

    /// Export every balance to CSV, registered or not
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let view = self.service.view().await;
        let balances = balance_snapshots(&view.people, view.balances);
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["identity", "display_name", "net_balance"])?;

        for entry in &balances {
            csv_writer.write_record([
                entry.identity.as_str(),
                entry.display_name.as_deref().unwrap_or(""),
                &entry.net_balance.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(balances.len())
    }

    /// Export the whole ledger as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let view = self.service.view().await;
        let balances = balance_snapshots(&view.people, view.balances);

        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            people: view.people,
            expenses: view.expenses,
            balances,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}

/// Join each balance with the display name of its registration, if any.
fn balance_snapshots(
    people: &[Person],
    balances: Vec<(Identity, Amount)>,
) -> Vec<BalanceSnapshot> {
    let names: HashMap<&Identity, &str> = people
        .iter()
        .map(|p| (&p.identity, p.display_name.as_str()))
        .collect();

    balances
        .into_iter()
        .map(|(identity, net_balance)| BalanceSnapshot {
            display_name: names.get(&identity).map(|name| name.to_string()),
            identity,
            net_balance,
        })
        .collect()
}
