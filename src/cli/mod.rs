use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::application::LedgerService;
use crate::domain::{format_amount, parse_amount, ExpenseDraft, LedgerConfig, ParticipationEntry};

/// Sharetab - Shared Expense Ledger
#[derive(Parser)]
#[command(name = "sharetab")]
#[command(about = "An append-only ledger of shared expenses and who owes whom")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "SHARETAB_DB", default_value = "sharetab.db")]
    pub database: String,

    /// Only accept expenses whose participants are all registered
    #[arg(long, env = "SHARETAB_REQUIRE_REGISTERED", global = true)]
    pub require_registered: bool,

    /// Only accept expenses whose total paid equals total owed
    #[arg(long, env = "SHARETAB_REQUIRE_BALANCED", global = true)]
    pub require_balanced: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Register an identity under a display name
    Register {
        /// Identity (e.g. "0x" followed by 40 hex digits)
        identity: String,

        /// Display name (cannot be changed later)
        name: String,
    },

    /// Show a registered person and their balance
    Person {
        /// Identity to look up
        identity: String,
    },

    /// List registered people with their net balances
    People,

    /// Expense commands
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Show the net balance of an identity, or of everyone
    Balance {
        /// Identity (omit for all registered people)
        identity: Option<String>,
    },

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: expenses, balances, full
        export_type: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record a shared expense
    Add {
        /// What the expense was for
        label: String,

        /// Participant as IDENTITY:PAID:OWED (repeat for each participant)
        #[arg(short, long = "participant", required = true)]
        participants: Vec<String>,
    },

    /// List recorded expenses
    List {
        /// Maximum number of expenses to show (most recent first)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show one expense with all of its participants
    Show {
        /// Expense id
        id: u64,
    },
}

impl Cli {
    pub fn config(&self) -> LedgerConfig {
        LedgerConfig {
            require_registered: self.require_registered,
            require_balanced: self.require_balanced,
        }
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();

        if let Commands::Init = self.command {
            LedgerService::init(&self.database, config).await?;
            println!("Database initialized: {}", self.database);
            return Ok(());
        }

        let service = LedgerService::connect(&self.database, config)
            .await
            .with_context(|| format!("Cannot open '{}'. Run 'sharetab init' first?", self.database))?;

        match self.command {
            Commands::Init => {}

            Commands::Register { identity, name } => {
                let person = service.register(&identity, &name).await?;
                println!("Registered {} ({})", person.display_name, person.identity);
            }

            Commands::Person { identity } => {
                let person = service.get_person(&identity).await?;
                let balance = service.net_balance(&identity).await?;
                println!("Person: {}", person.display_name);
                println!("  Identity:   {}", person.identity);
                println!(
                    "  Registered: {}",
                    person.registered_at.format("%Y-%m-%d %H:%M:%S")
                );
                println!("  Balance:    {}", format_amount(balance));
            }

            Commands::People => run_people_command(&service).await?,

            Commands::Expense(cmd) => run_expense_command(&service, cmd).await?,

            Commands::Balance { identity } => match identity {
                Some(identity) => {
                    let balance = service.net_balance(&identity).await?;
                    println!("{}: {}", identity, format_amount(balance));
                }
                None => run_people_command(&service).await?,
            },

            Commands::Check => run_check_command(&service).await?,

            Commands::Export {
                export_type,
                output,
            } => run_export_command(&service, &export_type, output.as_deref()).await?,
        }

        Ok(())
    }
}

async fn run_people_command(service: &LedgerService) -> Result<()> {
    let entries = service.people_with_balances().await;
    if entries.is_empty() {
        println!("No people registered.");
        return Ok(());
    }

    println!("{:<20} {:<12} {:>14}", "NAME", "IDENTITY", "NET BALANCE");
    println!("{}", "-".repeat(48));
    for entry in entries {
        println!(
            "{:<20} {:<12} {:>14}",
            truncate(&entry.person.display_name, 20),
            format!("{}...", entry.person.identity.short()),
            format_amount(entry.net_balance)
        );
    }
    Ok(())
}

async fn run_expense_command(service: &LedgerService, cmd: ExpenseCommands) -> Result<()> {
    match cmd {
        ExpenseCommands::Add {
            label,
            participants,
        } => {
            let entries = participants
                .iter()
                .map(|s| parse_participant(s))
                .collect::<Result<Vec<_>>>()?;
            let draft = ExpenseDraft::new(label).with_entries(entries);

            let id = service.add_expense(&draft).await?;
            println!("Recorded expense #{}", id);
        }

        ExpenseCommands::List { limit } => {
            let expenses = service.list_expenses().await;
            if expenses.is_empty() {
                println!("No expenses recorded.");
                return Ok(());
            }

            println!(
                "{:>5} {:<17} {:>12} {:>6} LABEL",
                "ID", "DATE", "TOTAL PAID", "PEOPLE"
            );
            println!("{}", "-".repeat(70));
            let shown = limit.unwrap_or(expenses.len());
            for expense in expenses.iter().rev().take(shown) {
                println!(
                    "{:>5} {:<17} {:>12} {:>6} {}",
                    expense.id,
                    expense.timestamp.format("%Y-%m-%d %H:%M"),
                    format_amount(expense.total_paid()),
                    expense.participants.len(),
                    truncate(&expense.label, 30)
                );
            }
        }

        ExpenseCommands::Show { id } => {
            let info = service.get_expense_info(id).await?;
            let expense = &info.expense;

            println!("Expense #{}: {}", expense.id, expense.label);
            println!(
                "  Recorded: {}",
                expense.timestamp.format("%Y-%m-%d %H:%M:%S")
            );
            println!();
            println!("  {:<20} {:>12} {:>12}", "PARTICIPANT", "PAID", "OWES");
            for p in &info.participants {
                let who = p
                    .display_name
                    .clone()
                    .unwrap_or_else(|| format!("{}...", p.participation.identity.short()));
                println!(
                    "  {:<20} {:>12} {:>12}",
                    truncate(&who, 20),
                    format_amount(p.participation.amount_paid),
                    format_amount(p.participation.amount_owed)
                );
            }
            println!(
                "  {:<20} {:>12} {:>12}",
                "Total",
                format_amount(expense.total_paid()),
                format_amount(expense.total_owed())
            );
            if !expense.is_balanced() {
                println!();
                println!("  Note: total paid and total owed differ.");
            }
        }
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("People:    {}", report.person_count);
    println!("Expenses:  {}", report.expense_count);
    println!("Net total: {}", format_amount(report.total_net_balance));
    if report.unbalanced_expenses > 0 {
        println!("Unbalanced expenses: {}", report.unbalanced_expenses);
    }
    if !report.unregistered.is_empty() {
        println!("Unregistered participants: {}", report.unregistered.len());
    }
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => Box::new(
            File::create(path).with_context(|| format!("Failed to create file: {}", path))?,
        ),
        None => Box::new(stdout()),
    };

    match export_type {
        "expenses" => {
            let count = exporter.export_expenses_csv(writer).await?;
            report_export(output, count, "expenses");
        }
        "balances" => {
            let count = exporter.export_balances_csv(writer).await?;
            report_export(output, count, "balances");
        }
        "full" => {
            let snapshot = exporter.export_full_json(writer).await?;
            report_export(output, snapshot.expenses.len(), "expenses (full snapshot)");
        }
        other => anyhow::bail!(
            "Unknown export type '{}'. Valid types: expenses, balances, full",
            other
        ),
    }
    Ok(())
}

fn report_export(output: Option<&str>, count: usize, what: &str) {
    // Keep stdout clean when the export itself went there
    if let Some(path) = output {
        println!("Exported {} {} to {}", count, what, path);
    }
}

/// Parse "IDENTITY:PAID:OWED" into a participation entry.
/// Amounts are decimal strings, e.g. "0x…:12.50:6.25".
pub fn parse_participant(input: &str) -> Result<ParticipationEntry> {
    let mut parts = input.rsplitn(3, ':');
    let (owed, paid, identity) = match (parts.next(), parts.next(), parts.next()) {
        (Some(owed), Some(paid), Some(identity)) => (owed, paid, identity),
        _ => anyhow::bail!(
            "Invalid participant '{}'. Use IDENTITY:PAID:OWED",
            input
        ),
    };

    Ok(ParticipationEntry {
        identity: identity.to_string(),
        amount_paid: parse_amount(paid)
            .with_context(|| format!("Invalid paid amount '{}'", paid))?,
        amount_owed: parse_amount(owed)
            .with_context(|| format!("Invalid owed amount '{}'", owed))?,
    })
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_participant() {
        let entry =
            parse_participant("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa:12.50:6.25").unwrap();
        assert_eq!(entry.identity, "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        assert_eq!(entry.amount_paid, 1250);
        assert_eq!(entry.amount_owed, 625);
    }

    #[test]
    fn test_parse_participant_keeps_negative_for_the_ledger() {
        let entry = parse_participant("someone:-1:0").unwrap();
        assert_eq!(entry.amount_paid, -100);
    }

    #[test]
    fn test_parse_participant_invalid() {
        assert!(parse_participant("0xabc:10").is_err());
        assert!(parse_participant("0xabc:ten:0").is_err());
        assert!(parse_participant("0xabc:1.001:0").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long label", 10), "a very ...");
    }

    #[test]
    fn test_cli_parses_participants() {
        let cli = Cli::try_parse_from([
            "sharetab",
            "--require-balanced",
            "expense",
            "add",
            "Dinner",
            "-p",
            "a:1:0",
            "--participant",
            "b:0:1",
        ])
        .unwrap();

        assert!(cli.config().require_balanced);
        match cli.command {
            Commands::Expense(ExpenseCommands::Add {
                label,
                participants,
            }) => {
                assert_eq!(label, "Dinner");
                assert_eq!(participants, vec!["a:1:0", "b:0:1"]);
            }
            _ => panic!("expected expense add"),
        }
    }
}
