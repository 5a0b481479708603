use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use uuid::Uuid;

use crate::application::{HistoryFilter, LedgerService, NewExpense};
use crate::domain::{format_cents, parse_cents, Cents, User, UserId};
use crate::settings::Settings;

/// PennyPals - Shared Expense Ledger
#[derive(Parser)]
#[command(name = "pennypals")]
#[command(about = "Split expenses in groups, track who owes whom and settle up from a wallet")]
#[command(version)]
pub struct Cli {
    /// Database file path (overrides the config file)
    #[arg(short, long)]
    pub database: Option<String>,

    /// Config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Username to act as (overrides the config file)
    #[arg(short, long, global = true)]
    pub user: Option<String>,

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

    /// User accounts
    #[command(subcommand)]
    User(UserCommands),

    /// Group management commands
    #[command(subcommand)]
    Group(GroupCommands),

    /// Record and inspect expenses
    #[command(subcommand)]
    Expense(ExpenseCommands),

    /// Show your balance across groups, or in one group
    Balance {
        /// Group ID (omit for the dashboard)
        #[arg(short, long)]
        group: Option<String>,
    },

    /// List expenses you paid or share in
    History {
        /// Filter by group ID
        #[arg(short, long)]
        group: Option<String>,

        /// Filter by title (case-insensitive)
        #[arg(short, long)]
        search: Option<String>,

        /// Maximum number of entries to show
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Wallet and payment commands
    #[command(subcommand)]
    Wallet(WalletCommands),

    /// Notification commands
    #[command(subcommand)]
    Notifications(NotificationCommands),

    /// Verify ledger integrity
    Check,

    /// Export data to CSV or JSON
    Export {
        /// What to export: history, balances
        export_type: String,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Output format: csv or json (json only for history)
        #[arg(short, long, default_value = "csv")]
        format: String,

        /// Group ID (required for balances, optional filter for history)
        #[arg(short, long)]
        group: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Register a new user
    Register {
        username: String,
        email: String,
        /// Display name
        name: String,

        #[arg(short, long)]
        password: String,

        /// Preferred currency (three-letter code)
        #[arg(long)]
        currency: Option<String>,
    },

    /// List all users
    List,

    /// Check a username and password
    Login {
        username: String,

        #[arg(short, long)]
        password: String,
    },
}

#[derive(Subcommand)]
pub enum GroupCommands {
    /// Create a group with you as a member
    Create {
        name: String,

        /// Usernames of the other members
        #[arg(short, long, num_args = 1..)]
        members: Vec<String>,
    },

    /// List your groups
    List,

    /// Show a group and its members
    Show { id: String },

    /// Add members to a group
    AddMembers {
        id: String,

        /// Usernames to add
        #[arg(required = true)]
        members: Vec<String>,
    },

    /// Delete a group with all its expenses
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense you paid
    Add {
        title: String,

        /// Amount (e.g., "85.50" or "20")
        amount: String,

        /// Group ID (all members share unless --with is given)
        #[arg(short, long)]
        group: Option<String>,

        /// Usernames sharing the expense
        #[arg(short, long, num_args = 1..)]
        with: Vec<String>,

        /// Date of the expense (YYYY-MM-DD, defaults to now)
        #[arg(long)]
        date: Option<String>,
    },

    /// Show an expense and its splits
    Show { id: String },

    /// List the expenses of a group
    List {
        #[arg(short, long)]
        group: String,
    },

    /// Delete an expense
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum WalletCommands {
    /// Show your wallet
    Show,

    /// Add funds to your wallet
    Load { amount: String },

    /// Link a bank account (only the last four digits are kept)
    LinkBank { account: String },

    /// Pay another user from your wallet
    Pay {
        /// Recipient username
        to: String,

        amount: String,

        #[arg(short, long)]
        note: Option<String>,
    },

    /// List payments you sent or received
    Payments,
}

#[derive(Subcommand)]
pub enum NotificationCommands {
    /// List your latest notifications
    List,

    /// Mark a notification as read
    Read { id: String },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let settings = Settings::new(self.config.as_deref()).context("Failed to load settings")?;
        init_logging(self.verbose, settings.log_level.as_deref())?;

        let database = self.database.clone().unwrap_or_else(|| settings.database.clone());
        let username = self.user.clone().or_else(|| settings.user.clone());
        log::debug!("Using database {}", database);

        match self.command {
            Commands::Init => {
                LedgerService::init(&database).await?;
                println!("Database initialized: {}", database);
            }

            Commands::User(user_cmd) => {
                let service = LedgerService::connect(&database).await?;
                run_user_command(&service, user_cmd, &settings).await?;
            }

            Commands::Group(group_cmd) => {
                let service = LedgerService::connect(&database).await?;
                let me = acting_user(&service, username.as_deref()).await?;
                run_group_command(&service, &me, group_cmd).await?;
            }

            Commands::Expense(expense_cmd) => {
                let service = LedgerService::connect(&database).await?;
                let me = acting_user(&service, username.as_deref()).await?;
                run_expense_command(&service, &me, expense_cmd).await?;
            }

            Commands::Balance { group } => {
                let service = LedgerService::connect(&database).await?;
                let me = acting_user(&service, username.as_deref()).await?;
                run_balance_command(&service, &me, group.as_deref()).await?;
            }

            Commands::History {
                group,
                search,
                limit,
            } => {
                let service = LedgerService::connect(&database).await?;
                let me = acting_user(&service, username.as_deref()).await?;
                let filter = HistoryFilter {
                    group: group.as_deref().map(parse_id).transpose()?,
                    search,
                    limit,
                };
                run_history_command(&service, &me, filter).await?;
            }

            Commands::Wallet(wallet_cmd) => {
                let service = LedgerService::connect(&database).await?;
                let me = acting_user(&service, username.as_deref()).await?;
                run_wallet_command(&service, &me, wallet_cmd).await?;
            }

            Commands::Notifications(cmd) => {
                let service = LedgerService::connect(&database).await?;
                let me = acting_user(&service, username.as_deref()).await?;
                run_notification_command(&service, &me, cmd).await?;
            }

            Commands::Check => {
                let service = LedgerService::connect(&database).await?;
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                output,
                format,
                group,
            } => {
                let service = LedgerService::connect(&database).await?;
                let me = acting_user(&service, username.as_deref()).await?;
                run_export_command(
                    &service,
                    &me,
                    &export_type,
                    output.as_deref(),
                    &format,
                    group.as_deref(),
                )
                .await?;
            }
        }

        Ok(())
    }
}

fn init_logging(verbose: bool, configured: Option<&str>) -> Result<()> {
    use log4rs::append::console::{ConsoleAppender, Target};
    use log4rs::config::{Appender, Config, Root};
    use log4rs::encode::pattern::PatternEncoder;

    let level = if verbose {
        LevelFilter::Debug
    } else {
        match configured {
            Some(name) => name
                .parse::<LevelFilter>()
                .map_err(|_| anyhow::anyhow!("Invalid log level '{}'", name))?,
            None => LevelFilter::Warn,
        }
    };

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} {h({l:<5})} {t} - {m}{n}",
        )))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .context("Invalid logging configuration")?;

    log4rs::init_config(config).context("Could not initialize logging")?;
    Ok(())
}

async fn acting_user(service: &LedgerService, username: Option<&str>) -> Result<User> {
    let username = username.ok_or_else(|| {
        anyhow::anyhow!("No user selected. Pass --user <username> or set `user` in the config file")
    })?;
    Ok(service.find_user(username).await?)
}

async fn resolve_usernames(service: &LedgerService, usernames: &[String]) -> Result<Vec<UserId>> {
    let mut ids = Vec::with_capacity(usernames.len());
    for name in usernames {
        ids.push(service.find_user(name).await?.id);
    }
    Ok(ids)
}

async fn run_user_command(
    service: &LedgerService,
    cmd: UserCommands,
    settings: &Settings,
) -> Result<()> {
    match cmd {
        UserCommands::Register {
            username,
            email,
            name,
            password,
            currency,
        } => {
            let currency = currency.unwrap_or_else(|| settings.default_currency.clone());
            let user = service
                .register_user(&username, &email, &name, &password, Some(&currency))
                .await?;
            println!("Registered user: {} ({})", user.username, user.id);
        }

        UserCommands::List => {
            let users = service.list_users().await?;
            if users.is_empty() {
                println!("No users found.");
            } else {
                println!("{:<16} {:<24} {:<28} {:<8}", "USERNAME", "NAME", "EMAIL", "CURRENCY");
                println!("{}", "-".repeat(79));
                for user in users {
                    println!(
                        "{:<16} {:<24} {:<28} {:<8}",
                        user.username, user.name, user.email, user.currency
                    );
                }
            }
        }

        UserCommands::Login { username, password } => {
            let user = service.authenticate(&username, &password).await?;
            println!("Welcome back, {} ({})", user.name, user.id);
        }
    }
    Ok(())
}

async fn run_group_command(service: &LedgerService, me: &User, cmd: GroupCommands) -> Result<()> {
    match cmd {
        GroupCommands::Create { name, members } => {
            let ids = resolve_usernames(service, &members).await?;
            let details = service.create_group(me.id, &name, &ids).await?;
            println!(
                "Created group: {} ({}) with {} member(s)",
                details.group.name,
                details.group.id,
                details.members.len()
            );
        }

        GroupCommands::List => {
            let groups = service.list_groups(me.id).await?;
            if groups.is_empty() {
                println!("No groups found.");
            } else {
                println!("{:<36}  {:<24}", "ID", "NAME");
                println!("{}", "-".repeat(62));
                for group in groups {
                    println!("{:<36}  {:<24}", group.id, group.name);
                }
            }
        }

        GroupCommands::Show { id } => {
            let details = service.get_group(me.id, parse_id(&id)?).await?;
            println!("Group: {}", details.group.name);
            println!("  ID:       {}", details.group.id);
            println!(
                "  Created:  {}",
                details.group.created_at.format("%Y-%m-%d %H:%M:%S")
            );
            println!("  Members:");
            for member in details.members {
                println!("    {:<16} {}", member.username, member.name);
            }
        }

        GroupCommands::AddMembers { id, members } => {
            let ids = resolve_usernames(service, &members).await?;
            let added = service.add_members(me.id, parse_id(&id)?, &ids).await?;
            println!("Added {} member(s)", added.len());
        }

        GroupCommands::Delete { id } => {
            let deleted = service.delete_group(me.id, parse_id(&id)?).await?;
            println!(
                "Deleted group: {} ({} expense(s), {} split(s) removed)",
                deleted.group.name, deleted.expenses_deleted, deleted.splits_deleted
            );
        }
    }
    Ok(())
}

async fn run_expense_command(
    service: &LedgerService,
    me: &User,
    cmd: ExpenseCommands,
) -> Result<()> {
    match cmd {
        ExpenseCommands::Add {
            title,
            amount,
            group,
            with,
            date,
        } => {
            let amount_cents = parse_amount(&amount)?;
            let participants = if with.is_empty() {
                None
            } else {
                Some(resolve_usernames(service, &with).await?)
            };

            let mut new = match group {
                Some(gid) => NewExpense::in_group(title, amount_cents, parse_id(&gid)?),
                None => NewExpense::ad_hoc(title, amount_cents, Vec::new()),
            };
            new.participants = participants.or(new.participants);
            if let Some(date_str) = date {
                let timestamp = parse_date(&date_str).with_context(|| {
                    format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str)
                })?;
                new = new.occurred_at(timestamp);
            }

            let details = service.record_expense(me.id, new).await?;
            println!(
                "Recorded expense: {} {} split {} way(s) ({})",
                details.expense.title,
                format_cents(details.expense.amount_cents),
                details.splits.len(),
                details.expense.id
            );
        }

        ExpenseCommands::Show { id } => {
            let details = service.get_expense(me.id, parse_id(&id)?).await?;
            let names = service.get_user_names().await?;
            let expense = &details.expense;

            println!("Expense: {}", expense.title);
            println!("  ID:       {}", expense.id);
            println!("  Amount:   {}", format_cents(expense.amount_cents));
            println!("  Paid by:  {}", display_name(&names, expense.paid_by));
            println!("  Date:     {}", expense.occurred_at.format("%Y-%m-%d"));
            if let Some(group_id) = expense.group_id {
                println!("  Group:    {}", group_id);
            }
            println!("  Splits:");
            for split in &details.splits {
                println!(
                    "    {:<24} {:>12}",
                    display_name(&names, split.user_id),
                    format_cents(split.amount_cents)
                );
            }
        }

        ExpenseCommands::List { group } => {
            let expenses = service.list_group_expenses(me.id, parse_id(&group)?).await?;
            if expenses.is_empty() {
                println!("No expenses found.");
            } else {
                let names = service.get_user_names().await?;
                println!(
                    "{:<10} {:<28} {:<20} {:>12}",
                    "DATE", "TITLE", "PAID BY", "AMOUNT"
                );
                println!("{}", "-".repeat(73));
                for expense in expenses {
                    println!(
                        "{:<10} {:<28} {:<20} {:>12}",
                        expense.occurred_at.format("%Y-%m-%d"),
                        truncate(&expense.title, 28),
                        truncate(&display_name(&names, expense.paid_by), 20),
                        format_cents(expense.amount_cents)
                    );
                }
            }
        }

        ExpenseCommands::Delete { id } => {
            let splits = service.delete_expense(me.id, parse_id(&id)?).await?;
            println!("Deleted expense {} ({} split(s) removed)", id, splits);
        }
    }
    Ok(())
}

async fn run_balance_command(service: &LedgerService, me: &User, group: Option<&str>) -> Result<()> {
    match group {
        Some(gid) => {
            let group_id = parse_id(gid)?;
            let own = service.group_balance(me.id, group_id).await?;
            println!("Group: {}", own.group.name);
            println!("  You are owed:  {:>12}", format_cents(own.position.owed_to_user));
            println!("  You owe:       {:>12}", format_cents(own.position.user_owes));
            println!("  Net:           {:>12}", format_cents(own.net));
            println!();

            println!("{:<16} {:<24} {:>12}", "USERNAME", "NAME", "NET");
            println!("{}", "-".repeat(54));
            for balance in service.group_balances(me.id, group_id).await? {
                let marker = if balance.is_member { "" } else { " (left)" };
                println!(
                    "{:<16} {:<24} {:>12}",
                    balance.user.username,
                    format!("{}{}", balance.user.name, marker),
                    format_cents(balance.net)
                );
            }
        }
        None => {
            let dashboard = service.dashboard(me.id).await?;
            if dashboard.groups.is_empty() {
                println!("No groups found.");
                return Ok(());
            }
            println!("{:<28} {:>8} {:>12}", "GROUP", "MEMBERS", "NET");
            println!("{}", "-".repeat(50));
            for entry in &dashboard.groups {
                println!(
                    "{:<28} {:>8} {:>12}",
                    truncate(&entry.group.name, 28),
                    entry.member_count,
                    format_cents(entry.net)
                );
            }
            println!("{}", "-".repeat(50));
            println!("{:<37} {:>12}", "TOTAL", format_cents(dashboard.balance));
        }
    }
    Ok(())
}

async fn run_history_command(
    service: &LedgerService,
    me: &User,
    filter: HistoryFilter,
) -> Result<()> {
    let entries = service.transaction_history(me.id, filter).await?;
    if entries.is_empty() {
        println!("No expenses found.");
        return Ok(());
    }

    println!(
        "{:<10} {:<24} {:<16} {:<16} {:>12} {:>12}",
        "DATE", "TITLE", "GROUP", "PAID BY", "AMOUNT", "YOURS"
    );
    println!("{}", "-".repeat(95));
    for entry in entries {
        let share: Cents = if entry.is_owed {
            -entry.your_share
        } else {
            entry.amount_cents - entry.your_share
        };
        println!(
            "{:<10} {:<24} {:<16} {:<16} {:>12} {:>12}",
            entry.occurred_at.format("%Y-%m-%d"),
            truncate(&entry.title, 24),
            truncate(entry.group_name.as_deref().unwrap_or("-"), 16),
            truncate(&entry.paid_by_name, 16),
            format_cents(entry.amount_cents),
            format_cents(share)
        );
    }
    Ok(())
}

async fn run_wallet_command(service: &LedgerService, me: &User, cmd: WalletCommands) -> Result<()> {
    match cmd {
        WalletCommands::Show => {
            let wallet = service.get_wallet(me.id).await?;
            println!("Wallet of {}", me.name);
            println!("  Balance:  {} {}", format_cents(wallet.balance_cents), me.currency);
            match &wallet.bank_last_four {
                Some(last_four) => println!("  Bank:     ****{}", last_four),
                None => println!("  Bank:     not linked"),
            }
        }

        WalletCommands::Load { amount } => {
            let amount_cents = parse_amount(&amount)?;
            let wallet = service.load_balance(me.id, amount_cents).await?;
            println!(
                "Loaded {}. New balance: {}",
                format_cents(amount_cents),
                format_cents(wallet.balance_cents)
            );
        }

        WalletCommands::LinkBank { account } => {
            let wallet = service.link_bank(me.id, &account).await?;
            if let Some(last_four) = wallet.bank_last_four {
                println!("Linked bank account ****{}", last_four);
            }
        }

        WalletCommands::Pay { to, amount, note } => {
            let amount_cents = parse_amount(&amount)?;
            let recipient = service.find_user(&to).await?;
            let result = service
                .pay_user(me.id, recipient.id, amount_cents, note)
                .await?;
            println!(
                "Paid {} to {} ({}). Remaining balance: {}",
                format_cents(result.payment.amount_cents),
                result.to_name,
                result.payment.id,
                format_cents(result.remaining_balance)
            );
        }

        WalletCommands::Payments => {
            let payments = service.list_payments(me.id).await?;
            if payments.is_empty() {
                println!("No payments found.");
            } else {
                let names = service.get_user_names().await?;
                println!(
                    "{:<19} {:<20} {:<20} {:>12}  {}",
                    "DATE", "FROM", "TO", "AMOUNT", "NOTE"
                );
                println!("{}", "-".repeat(80));
                for payment in payments {
                    println!(
                        "{:<19} {:<20} {:<20} {:>12}  {}",
                        payment.created_at.format("%Y-%m-%d %H:%M:%S"),
                        truncate(&display_name(&names, payment.from_user), 20),
                        truncate(&display_name(&names, payment.to_user), 20),
                        format_cents(payment.effect_on(me.id)),
                        payment.note.as_deref().unwrap_or("")
                    );
                }
            }
        }
    }
    Ok(())
}

async fn run_notification_command(
    service: &LedgerService,
    me: &User,
    cmd: NotificationCommands,
) -> Result<()> {
    match cmd {
        NotificationCommands::List => {
            let notifications = service.list_notifications(me.id).await?;
            if notifications.is_empty() {
                println!("No notifications.");
            } else {
                for n in notifications {
                    println!(
                        "{} {} [{}] {}  ({})",
                        if n.read { " " } else { "*" },
                        n.created_at.format("%Y-%m-%d %H:%M"),
                        n.kind,
                        n.message,
                        n.id
                    );
                }
            }
        }

        NotificationCommands::Read { id } => {
            service.mark_notification_read(me.id, parse_id(&id)?).await?;
            println!("Marked as read");
        }
    }
    Ok(())
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    let report = service.check_integrity().await?;

    println!("Ledger Integrity Check");
    println!("{}", "=".repeat(40));
    println!("  Users:          {}", report.user_count);
    println!("  Groups:         {}", report.group_count);
    println!("  Expenses:       {}", report.expense_count);
    println!("  Splits:         {}", report.split_count);
    println!("  Wallets:        {}", report.wallet_count);
    println!("  Payments:       {}", report.payment_count);
    println!(
        "  Wallet money:   {}",
        format_cents(report.total_wallet_cents)
    );
    println!();

    if report.is_healthy() {
        println!("Status: OK");
    } else {
        println!("Status: PROBLEMS FOUND");
        for problem in report.problems() {
            println!("  - {}", problem);
        }
        anyhow::bail!("Integrity check failed");
    }
    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    me: &User,
    export_type: &str,
    output: Option<&str>,
    format: &str,
    group: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{stdout, Write};

    let exporter = Exporter::new(service, me.id);
    let group = group.map(parse_id).transpose()?;

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match (export_type, format) {
        ("history", "csv") => {
            let filter = HistoryFilter {
                group,
                ..Default::default()
            };
            let count = exporter.export_history_csv(writer, filter).await?;
            if output.is_some() {
                eprintln!("Exported {} expenses", count);
            }
        }
        ("history", "json") => {
            let filter = HistoryFilter {
                group,
                ..Default::default()
            };
            let snapshot = exporter.export_history_json(writer, filter).await?;
            if output.is_some() {
                eprintln!("Exported {} expenses", snapshot.entries.len());
            }
        }
        ("balances", "csv") => {
            let group = group.context("Exporting balances requires --group")?;
            let count = exporter.export_balances_csv(writer, group).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        ("history", _) | ("balances", _) => {
            anyhow::bail!("Unsupported format '{}' for {}", format, export_type);
        }
        _ => {
            anyhow::bail!(
                "Invalid export type '{}'. Valid types: history, balances",
                export_type
            );
        }
    }

    Ok(())
}

fn parse_amount(amount: &str) -> Result<Cents> {
    parse_cents(amount).context("Invalid amount format. Use '50.00' or '50'")
}

fn parse_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).with_context(|| format!("Invalid ID: {}", id))
}

fn display_name(names: &std::collections::HashMap<UserId, String>, id: UserId) -> String {
    names.get(&id).cloned().unwrap_or_else(|| id.to_string())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

fn parse_date(date_str: &str) -> Result<DateTime<Utc>> {
    use chrono::NaiveDate;

    let naive_date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .context("Date must be in YYYY-MM-DD format")?;

    let naive_datetime = naive_date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| anyhow::anyhow!("Invalid date"))?;

    Ok(DateTime::from_naive_utc_and_offset(naive_datetime, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_date() {
        let date = parse_date("2024-03-15").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 3, 15));
        assert!(parse_date("15/03/2024").is_err());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Dinner", 10), "Dinner");
        assert_eq!(truncate("Weekend groceries", 10), "Weekend...");
    }

    #[test]
    fn test_cli_parses_expense_add() {
        let cli = Cli::try_parse_from([
            "pennypals",
            "--user",
            "ana",
            "expense",
            "add",
            "Dinner",
            "85.50",
            "--with",
            "ben",
            "cat",
        ])
        .unwrap();

        assert_eq!(cli.user.as_deref(), Some("ana"));
        match cli.command {
            Commands::Expense(ExpenseCommands::Add {
                title,
                amount,
                with,
                group,
                ..
            }) => {
                assert_eq!(title, "Dinner");
                assert_eq!(amount, "85.50");
                assert_eq!(with, vec!["ben", "cat"]);
                assert!(group.is_none());
            }
            _ => panic!("expected expense add"),
        }
    }
}
