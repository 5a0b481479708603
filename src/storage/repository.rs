use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::{
    Cents, Expense, ExpenseId, ExpenseSplit, Group, GroupId, IntegrityReport, Notification,
    NotificationId, NotificationKind, PasswordHash, Payment, User, UserId, Wallet,
};

use super::MIGRATION_001_INITIAL;

/// An expense as seen from one user's transaction history.
#[derive(Debug, Clone)]
pub struct HistoryRow {
    pub expense: Expense,
    pub group_name: Option<String>,
    pub payer_name: String,
    /// The user's own split, if they have one
    pub share_cents: Option<Cents>,
}

/// Outcome of a guarded wallet-to-wallet transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed,
    /// The sender's balance could not cover the amount; nothing was written.
    InsufficientFunds,
}

/// A group together with everything needed to compute its balances.
#[derive(Debug, Clone)]
pub struct GroupLedger {
    pub group: Group,
    pub members: Vec<User>,
    /// Newest first
    pub expenses: Vec<Expense>,
    pub splits: Vec<ExpenseSplit>,
}

impl GroupLedger {
    pub fn has_member(&self, user_id: UserId) -> bool {
        self.members.iter().any(|u| u.id == user_id)
    }
}

/// Outcome of a guarded group deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupDeletion {
    Deleted { expenses: u64, splits: u64 },
    /// The requester is not a member; nothing was written.
    NotMember,
    GroupNotFound,
}

/// Outcome of inserting a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveUserOutcome {
    Saved,
    UsernameTaken,
    EmailTaken,
}

/// Repository for persisting and querying users, groups, expenses and wallets.
///
/// Every method that writes more than one row does so inside a single
/// transaction; an early return drops the transaction and rolls it back.
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

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // User operations
    // ========================

    /// Insert a new user. A username or email that is already taken is
    /// reported through [`SaveUserOutcome`] rather than as an error, so a
    /// registration that loses a race still reads as a conflict.
    pub async fn save_user(&self, user: &User) -> Result<SaveUserOutcome> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO users (id, username, email, name, password_hash, currency, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.password_hash.as_str())
        .bind(&user.currency)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match inserted {
            Ok(_) => Ok(SaveUserOutcome::Saved),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                if e.message().contains("users.email") {
                    Ok(SaveUserOutcome::EmailTaken)
                } else {
                    Ok(SaveUserOutcome::UsernameTaken)
                }
            }
            Err(e) => Err(e).context("Failed to save user"),
        }
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, name, password_hash, currency, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, name, password_hash, currency, created_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by username")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, username, email, name, password_hash, currency, created_at
            FROM users
            WHERE email = ?
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user by email")?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, username, email, name, password_hash, currency, created_at FROM users ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        rows.iter().map(Self::row_to_user).collect()
    }

    fn row_to_user(row: &SqliteRow) -> Result<User> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(User {
            id: Uuid::parse_str(&id_str).context("Invalid user ID")?,
            username: row.get("username"),
            email: row.get("email"),
            name: row.get("name"),
            password_hash: PasswordHash::from_stored(row.get("password_hash")),
            currency: row.get("currency"),
            created_at: parse_timestamp(&created_at_str, "user created_at")?,
        })
    }

    // ========================
    // Group operations
    // ========================

    /// Save a new group and its initial members in one transaction.
    /// Returns the members that were added, in input order.
    pub async fn create_group(
        &self,
        group: &Group,
        member_ids: &[UserId],
        notice: &str,
        notify_except: UserId,
    ) -> Result<Vec<UserId>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("INSERT INTO expense_groups (id, name, created_at) VALUES (?, ?, ?)")
            .bind(group.id.to_string())
            .bind(&group.name)
            .bind(group.created_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .context("Failed to save group")?;

        let added = insert_members(&mut tx, group.id, member_ids, notice, notify_except).await?;

        tx.commit().await.context("Failed to commit group")?;
        Ok(added)
    }

    pub async fn get_group(&self, id: GroupId) -> Result<Option<Group>> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        fetch_group(&mut conn, id).await
    }

    /// Groups the user belongs to, ordered by name.
    pub async fn list_groups_for_user(&self, user_id: UserId) -> Result<Vec<Group>> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        fetch_groups_for_user(&mut conn, user_id).await
    }

    pub async fn list_group_members(&self, group_id: GroupId) -> Result<Vec<User>> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        fetch_group_members(&mut conn, group_id).await
    }

    /// A group with its members, expenses and splits, read in one transaction
    /// so the pieces always describe the same state.
    pub async fn get_group_ledger(&self, group_id: GroupId) -> Result<Option<GroupLedger>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let ledger = match fetch_group(&mut tx, group_id).await? {
            Some(group) => Some(fetch_group_ledger(&mut tx, group).await?),
            None => None,
        };
        tx.commit().await.context("Failed to finish ledger read")?;
        Ok(ledger)
    }

    /// Ledgers of every group the user belongs to, by group name, all read
    /// from one snapshot.
    pub async fn list_group_ledgers_for_user(&self, user_id: UserId) -> Result<Vec<GroupLedger>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let groups = fetch_groups_for_user(&mut tx, user_id).await?;
        let mut ledgers = Vec::with_capacity(groups.len());
        for group in groups {
            ledgers.push(fetch_group_ledger(&mut tx, group).await?);
        }
        tx.commit().await.context("Failed to finish ledger read")?;
        Ok(ledgers)
    }

    pub async fn is_member(&self, group_id: GroupId, user_id: UserId) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) as count FROM group_members WHERE group_id = ? AND user_id = ?",
        )
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await
        .context("Failed to check group membership")?;

        Ok(row.get::<i64, _>("count") > 0)
    }

    /// Add members to an existing group, skipping those already in it.
    /// Returns the ids that were actually added.
    pub async fn add_members(
        &self,
        group_id: GroupId,
        member_ids: &[UserId],
        notice: &str,
        notify_except: UserId,
    ) -> Result<Vec<UserId>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let added = insert_members(&mut tx, group_id, member_ids, notice, notify_except).await?;
        tx.commit().await.context("Failed to commit new members")?;
        Ok(added)
    }

    /// Delete a group with everything it owns, provided `requested_by` is a
    /// member. Membership links go first; that statement only matches when the
    /// requester is a member, so the check and the cascade share one
    /// transaction. Splits, expenses and the group row follow.
    pub async fn delete_group(
        &self,
        group_id: GroupId,
        requested_by: UserId,
    ) -> Result<GroupDeletion> {
        let id = group_id.to_string();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let links = sqlx::query(
            r#"
            DELETE FROM group_members
            WHERE group_id = ?
              AND EXISTS (SELECT 1 FROM group_members WHERE group_id = ? AND user_id = ?)
            "#,
        )
        .bind(&id)
        .bind(&id)
        .bind(requested_by.to_string())
        .execute(&mut *tx)
        .await
        .context("Failed to clear group members")?
        .rows_affected();

        if links == 0 {
            let exists = fetch_group(&mut tx, group_id).await?.is_some();
            tx.rollback().await.context("Failed to roll back group deletion")?;
            return Ok(if exists {
                GroupDeletion::NotMember
            } else {
                GroupDeletion::GroupNotFound
            });
        }

        let splits = sqlx::query(
            "DELETE FROM expense_splits WHERE expense_id IN (SELECT id FROM expenses WHERE group_id = ?)",
        )
        .bind(&id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete group splits")?
        .rows_affected();

        let expenses = sqlx::query("DELETE FROM expenses WHERE group_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete group expenses")?
            .rows_affected();

        sqlx::query("DELETE FROM expense_groups WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete group")?;

        tx.commit().await.context("Failed to commit group deletion")?;
        Ok(GroupDeletion::Deleted { expenses, splits })
    }

    fn row_to_group(row: &SqliteRow) -> Result<Group> {
        let id_str: String = row.get("id");
        let created_at_str: String = row.get("created_at");

        Ok(Group {
            id: Uuid::parse_str(&id_str).context("Invalid group ID")?,
            name: row.get("name"),
            created_at: parse_timestamp(&created_at_str, "group created_at")?,
        })
    }

    // ========================
    // Expense operations
    // ========================

    /// Save an expense together with its splits and the notifications it triggers.
    pub async fn save_expense(
        &self,
        expense: &Expense,
        splits: &[ExpenseSplit],
        notifications: &[Notification],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query(
            r#"
            INSERT INTO expenses (id, title, amount_cents, paid_by, group_id, occurred_at, recorded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(expense.id.to_string())
        .bind(&expense.title)
        .bind(expense.amount_cents)
        .bind(expense.paid_by.to_string())
        .bind(expense.group_id.map(|id| id.to_string()))
        .bind(expense.occurred_at.to_rfc3339())
        .bind(expense.recorded_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save expense")?;

        for split in splits {
            sqlx::query(
                "INSERT INTO expense_splits (id, expense_id, user_id, amount_cents) VALUES (?, ?, ?, ?)",
            )
            .bind(split.id.to_string())
            .bind(split.expense_id.to_string())
            .bind(split.user_id.to_string())
            .bind(split.amount_cents)
            .execute(&mut *tx)
            .await
            .context("Failed to save expense split")?;
        }

        for notification in notifications {
            insert_notification(&mut tx, notification).await?;
        }

        tx.commit().await.context("Failed to commit expense")?;
        Ok(())
    }

    pub async fn get_expense(&self, id: ExpenseId) -> Result<Option<Expense>> {
        let row = sqlx::query(
            r#"
            SELECT id, title, amount_cents, paid_by, group_id, occurred_at, recorded_at
            FROM expenses
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch expense")?;

        row.as_ref().map(Self::row_to_expense).transpose()
    }

    pub async fn list_splits_for_expense(&self, expense_id: ExpenseId) -> Result<Vec<ExpenseSplit>> {
        let rows = sqlx::query(
            r#"
            SELECT id, expense_id, user_id, amount_cents
            FROM expense_splits
            WHERE expense_id = ?
            ORDER BY rowid
            "#,
        )
        .bind(expense_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list expense splits")?;

        rows.iter().map(Self::row_to_split).collect()
    }

    /// Expenses owned by a group, newest first.
    pub async fn list_expenses_for_group(&self, group_id: GroupId) -> Result<Vec<Expense>> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        fetch_group_expenses(&mut conn, group_id).await
    }

    /// Delete an expense and its splits. Returns the number of splits removed.
    pub async fn delete_expense(&self, expense_id: ExpenseId) -> Result<u64> {
        let id = expense_id.to_string();
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let splits = sqlx::query("DELETE FROM expense_splits WHERE expense_id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete expense splits")?
            .rows_affected();

        sqlx::query("DELETE FROM expenses WHERE id = ?")
            .bind(&id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete expense")?;

        tx.commit().await.context("Failed to commit expense deletion")?;
        Ok(splits)
    }

    /// Expenses the user paid or has a split in, newest first, with optional filters.
    pub async fn list_history(
        &self,
        user_id: UserId,
        group_id: Option<GroupId>,
        search: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryRow>> {
        let mut query = String::from(
            r#"
            SELECT e.id, e.title, e.amount_cents, e.paid_by, e.group_id, e.occurred_at, e.recorded_at,
                   g.name AS group_name, u.name AS payer_name, s.amount_cents AS share_cents
            FROM expenses e
            JOIN users u ON u.id = e.paid_by
            LEFT JOIN expense_groups g ON g.id = e.group_id
            LEFT JOIN expense_splits s ON s.expense_id = e.id AND s.user_id = ?
            WHERE (e.paid_by = ? OR s.id IS NOT NULL)
            "#,
        );

        let user_id_str = user_id.to_string();
        let group_id_str = group_id.map(|id| id.to_string());
        let pattern = search.map(|s| format!("%{}%", escape_like(&s.to_lowercase())));

        if group_id.is_some() {
            query.push_str(" AND e.group_id = ?");
        }
        if pattern.is_some() {
            query.push_str(" AND LOWER(e.title) LIKE ? ESCAPE '\\'");
        }

        query.push_str(" ORDER BY e.occurred_at DESC, e.rowid DESC");

        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query).bind(&user_id_str).bind(&user_id_str);
        if let Some(ref gid) = group_id_str {
            sql_query = sql_query.bind(gid);
        }
        if let Some(ref pat) = pattern {
            sql_query = sql_query.bind(pat);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list transaction history")?;

        rows.iter()
            .map(|row| {
                Ok(HistoryRow {
                    expense: Self::row_to_expense(row)?,
                    group_name: row.get("group_name"),
                    payer_name: row.get("payer_name"),
                    share_cents: row.get("share_cents"),
                })
            })
            .collect()
    }

    fn row_to_expense(row: &SqliteRow) -> Result<Expense> {
        let id_str: String = row.get("id");
        let paid_by_str: String = row.get("paid_by");
        let group_id_str: Option<String> = row.get("group_id");
        let occurred_at_str: String = row.get("occurred_at");
        let recorded_at_str: String = row.get("recorded_at");

        Ok(Expense {
            id: Uuid::parse_str(&id_str).context("Invalid expense ID")?,
            title: row.get("title"),
            amount_cents: row.get("amount_cents"),
            paid_by: Uuid::parse_str(&paid_by_str).context("Invalid payer ID")?,
            group_id: group_id_str
                .map(|s| Uuid::parse_str(&s))
                .transpose()
                .context("Invalid expense group ID")?,
            occurred_at: parse_timestamp(&occurred_at_str, "occurred_at")?,
            recorded_at: parse_timestamp(&recorded_at_str, "recorded_at")?,
        })
    }

    fn row_to_split(row: &SqliteRow) -> Result<ExpenseSplit> {
        let id_str: String = row.get("id");
        let expense_id_str: String = row.get("expense_id");
        let user_id_str: String = row.get("user_id");

        Ok(ExpenseSplit {
            id: Uuid::parse_str(&id_str).context("Invalid split ID")?,
            expense_id: Uuid::parse_str(&expense_id_str).context("Invalid split expense ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid split user ID")?,
            amount_cents: row.get("amount_cents"),
        })
    }

    // ========================
    // Wallet operations
    // ========================

    pub async fn get_wallet(&self, user_id: UserId) -> Result<Option<Wallet>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, balance_cents, bank_last_four, created_at
            FROM wallets
            WHERE user_id = ?
            "#,
        )
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch wallet")?;

        row.as_ref().map(Self::row_to_wallet).transpose()
    }

    /// Add funds to a user's wallet, creating the wallet first if needed.
    pub async fn credit_wallet(&self, user_id: UserId, amount_cents: Cents) -> Result<Wallet> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        ensure_wallet(&mut tx, user_id).await?;
        sqlx::query("UPDATE wallets SET balance_cents = balance_cents + ? WHERE user_id = ?")
            .bind(amount_cents)
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to credit wallet")?;
        let wallet = fetch_wallet(&mut tx, user_id).await?;

        tx.commit().await.context("Failed to commit wallet load")?;
        Ok(wallet)
    }

    /// Store the last-four token of a linked bank account.
    pub async fn set_bank_last_four(&self, user_id: UserId, last_four: &str) -> Result<Wallet> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        ensure_wallet(&mut tx, user_id).await?;
        sqlx::query("UPDATE wallets SET bank_last_four = ? WHERE user_id = ?")
            .bind(last_four)
            .bind(user_id.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to link bank account")?;
        let wallet = fetch_wallet(&mut tx, user_id).await?;

        tx.commit().await.context("Failed to commit bank link")?;
        Ok(wallet)
    }

    /// Move `payment.amount_cents` from the sender's wallet to the recipient's.
    ///
    /// The debit only applies while the sender's balance covers the amount, so
    /// concurrent payments from one wallet can never overdraw it. The recipient
    /// wallet is created on demand. Debit, credit, payment record and the
    /// recipient's notification commit together.
    pub async fn transfer(
        &self,
        payment: &Payment,
        notification: &Notification,
    ) -> Result<TransferOutcome> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let debited = sqlx::query(
            r#"
            UPDATE wallets
            SET balance_cents = balance_cents - ?
            WHERE user_id = ? AND balance_cents >= ?
            "#,
        )
        .bind(payment.amount_cents)
        .bind(payment.from_user.to_string())
        .bind(payment.amount_cents)
        .execute(&mut *tx)
        .await
        .context("Failed to debit sender wallet")?
        .rows_affected();

        if debited == 0 {
            tx.rollback().await.context("Failed to roll back transfer")?;
            return Ok(TransferOutcome::InsufficientFunds);
        }

        ensure_wallet(&mut tx, payment.to_user).await?;
        sqlx::query("UPDATE wallets SET balance_cents = balance_cents + ? WHERE user_id = ?")
            .bind(payment.amount_cents)
            .bind(payment.to_user.to_string())
            .execute(&mut *tx)
            .await
            .context("Failed to credit recipient wallet")?;

        sqlx::query(
            r#"
            INSERT INTO payments (id, from_user_id, to_user_id, amount_cents, note, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(payment.id.to_string())
        .bind(payment.from_user.to_string())
        .bind(payment.to_user.to_string())
        .bind(payment.amount_cents)
        .bind(&payment.note)
        .bind(payment.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to record payment")?;

        insert_notification(&mut tx, notification).await?;

        tx.commit().await.context("Failed to commit transfer")?;
        Ok(TransferOutcome::Completed)
    }

    /// Payments sent or received by a user, newest first.
    pub async fn list_payments_for_user(&self, user_id: UserId) -> Result<Vec<Payment>> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_user_id, to_user_id, amount_cents, note, created_at
            FROM payments
            WHERE from_user_id = ? OR to_user_id = ?
            ORDER BY created_at DESC, rowid DESC
            "#,
        )
        .bind(user_id.to_string())
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await
        .context("Failed to list payments")?;

        rows.iter().map(Self::row_to_payment).collect()
    }

    /// Sum of every wallet balance in the store.
    pub async fn total_wallet_balance(&self) -> Result<Cents> {
        let row = sqlx::query("SELECT COALESCE(SUM(balance_cents), 0) as total FROM wallets")
            .fetch_one(&self.pool)
            .await
            .context("Failed to sum wallet balances")?;

        Ok(row.get("total"))
    }

    fn row_to_wallet(row: &SqliteRow) -> Result<Wallet> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");
        let created_at_str: String = row.get("created_at");

        Ok(Wallet {
            id: Uuid::parse_str(&id_str).context("Invalid wallet ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid wallet user ID")?,
            balance_cents: row.get("balance_cents"),
            bank_last_four: row.get("bank_last_four"),
            created_at: parse_timestamp(&created_at_str, "wallet created_at")?,
        })
    }

    fn row_to_payment(row: &SqliteRow) -> Result<Payment> {
        let id_str: String = row.get("id");
        let from_str: String = row.get("from_user_id");
        let to_str: String = row.get("to_user_id");
        let created_at_str: String = row.get("created_at");

        Ok(Payment {
            id: Uuid::parse_str(&id_str).context("Invalid payment ID")?,
            from_user: Uuid::parse_str(&from_str).context("Invalid payment sender")?,
            to_user: Uuid::parse_str(&to_str).context("Invalid payment recipient")?,
            amount_cents: row.get("amount_cents"),
            note: row.get("note"),
            created_at: parse_timestamp(&created_at_str, "payment created_at")?,
        })
    }

    // ========================
    // Notification operations
    // ========================

    /// A user's notifications, newest first.
    pub async fn list_notifications(&self, user_id: UserId, limit: usize) -> Result<Vec<Notification>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, kind, message, is_read, created_at
            FROM notifications
            WHERE user_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
        )
        .bind(user_id.to_string())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list notifications")?;

        rows.iter().map(Self::row_to_notification).collect()
    }

    /// Mark a notification as read. Returns false when no notification with
    /// that id belongs to the user.
    pub async fn mark_notification_read(&self, id: NotificationId, user_id: UserId) -> Result<bool> {
        let updated = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to mark notification read")?
            .rows_affected();

        Ok(updated > 0)
    }

    fn row_to_notification(row: &SqliteRow) -> Result<Notification> {
        let id_str: String = row.get("id");
        let user_id_str: String = row.get("user_id");
        let kind_str: String = row.get("kind");
        let created_at_str: String = row.get("created_at");

        Ok(Notification {
            id: Uuid::parse_str(&id_str).context("Invalid notification ID")?,
            user_id: Uuid::parse_str(&user_id_str).context("Invalid notification user ID")?,
            kind: NotificationKind::from_str(&kind_str)
                .ok_or_else(|| anyhow::anyhow!("Invalid notification kind: {}", kind_str))?,
            message: row.get("message"),
            read: row.get::<i32, _>("is_read") != 0,
            created_at: parse_timestamp(&created_at_str, "notification created_at")?,
        })
    }

    // ========================
    // Integrity
    // ========================

    pub async fn get_integrity_report(&self) -> Result<IntegrityReport> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) as user_count,
                (SELECT COUNT(*) FROM expense_groups) as group_count,
                (SELECT COUNT(*) FROM expenses) as expense_count,
                (SELECT COUNT(*) FROM expense_splits) as split_count,
                (SELECT COUNT(*) FROM wallets) as wallet_count,
                (SELECT COUNT(*) FROM payments) as payment_count,
                (SELECT COALESCE(SUM(balance_cents), 0) FROM wallets) as total_wallet_cents,
                (SELECT COUNT(*) FROM expenses e
                    WHERE e.amount_cents != (
                        SELECT COALESCE(SUM(s.amount_cents), 0)
                        FROM expense_splits s
                        WHERE s.expense_id = e.id
                    )) as unbalanced_expenses,
                (SELECT COUNT(*) FROM expense_splits s
                    WHERE NOT EXISTS (SELECT 1 FROM expenses e WHERE e.id = s.expense_id)) as orphan_splits,
                (SELECT COUNT(*) FROM wallets WHERE balance_cents < 0) as negative_wallets,
                (SELECT COUNT(*) FROM expense_groups g
                    WHERE NOT EXISTS (SELECT 1 FROM group_members m WHERE m.group_id = g.id)) as empty_groups
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to collect integrity statistics")?;

        Ok(IntegrityReport {
            user_count: row.get("user_count"),
            group_count: row.get("group_count"),
            expense_count: row.get("expense_count"),
            split_count: row.get("split_count"),
            wallet_count: row.get("wallet_count"),
            payment_count: row.get("payment_count"),
            total_wallet_cents: row.get("total_wallet_cents"),
            unbalanced_expenses: row.get("unbalanced_expenses"),
            orphan_splits: row.get("orphan_splits"),
            negative_wallets: row.get("negative_wallets"),
            empty_groups: row.get("empty_groups"),
        })
    }
}

async fn fetch_group(conn: &mut SqliteConnection, id: GroupId) -> Result<Option<Group>> {
    let row = sqlx::query("SELECT id, name, created_at FROM expense_groups WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch group")?;

    row.as_ref().map(Repository::row_to_group).transpose()
}

async fn fetch_groups_for_user(conn: &mut SqliteConnection, user_id: UserId) -> Result<Vec<Group>> {
    let rows = sqlx::query(
        r#"
        SELECT g.id, g.name, g.created_at
        FROM expense_groups g
        JOIN group_members m ON m.group_id = g.id
        WHERE m.user_id = ?
        ORDER BY g.name, g.created_at
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list groups for user")?;

    rows.iter().map(Repository::row_to_group).collect()
}

async fn fetch_group_members(conn: &mut SqliteConnection, group_id: GroupId) -> Result<Vec<User>> {
    let rows = sqlx::query(
        r#"
        SELECT u.id, u.username, u.email, u.name, u.password_hash, u.currency, u.created_at
        FROM users u
        JOIN group_members m ON m.user_id = u.id
        WHERE m.group_id = ?
        ORDER BY u.username
        "#,
    )
    .bind(group_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list group members")?;

    rows.iter().map(Repository::row_to_user).collect()
}

async fn fetch_group_expenses(conn: &mut SqliteConnection, group_id: GroupId) -> Result<Vec<Expense>> {
    let rows = sqlx::query(
        r#"
        SELECT id, title, amount_cents, paid_by, group_id, occurred_at, recorded_at
        FROM expenses
        WHERE group_id = ?
        ORDER BY occurred_at DESC, rowid DESC
        "#,
    )
    .bind(group_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list group expenses")?;

    rows.iter().map(Repository::row_to_expense).collect()
}

async fn fetch_group_splits(conn: &mut SqliteConnection, group_id: GroupId) -> Result<Vec<ExpenseSplit>> {
    let rows = sqlx::query(
        r#"
        SELECT s.id, s.expense_id, s.user_id, s.amount_cents
        FROM expense_splits s
        JOIN expenses e ON e.id = s.expense_id
        WHERE e.group_id = ?
        "#,
    )
    .bind(group_id.to_string())
    .fetch_all(&mut *conn)
    .await
    .context("Failed to list group splits")?;

    rows.iter().map(Repository::row_to_split).collect()
}

async fn fetch_group_ledger(conn: &mut SqliteConnection, group: Group) -> Result<GroupLedger> {
    let members = fetch_group_members(conn, group.id).await?;
    let expenses = fetch_group_expenses(conn, group.id).await?;
    let splits = fetch_group_splits(conn, group.id).await?;
    Ok(GroupLedger {
        group,
        members,
        expenses,
        splits,
    })
}

/// Escape `LIKE` wildcards so user input matches literally (paired with `ESCAPE '\'`).
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

async fn insert_members(
    conn: &mut SqliteConnection,
    group_id: GroupId,
    member_ids: &[UserId],
    notice: &str,
    notify_except: UserId,
) -> Result<Vec<UserId>> {
    let joined_at = Utc::now().to_rfc3339();
    let mut added = Vec::new();

    for member_id in member_ids {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO group_members (group_id, user_id, joined_at) VALUES (?, ?, ?)",
        )
        .bind(group_id.to_string())
        .bind(member_id.to_string())
        .bind(&joined_at)
        .execute(&mut *conn)
        .await
        .context("Failed to add group member")?
        .rows_affected();

        if inserted == 0 {
            continue;
        }
        added.push(*member_id);
        if *member_id != notify_except {
            let notification = Notification::new(*member_id, NotificationKind::Group, notice);
            insert_notification(conn, &notification).await?;
        }
    }

    Ok(added)
}

async fn insert_notification(conn: &mut SqliteConnection, notification: &Notification) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, kind, message, is_read, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(notification.id.to_string())
    .bind(notification.user_id.to_string())
    .bind(notification.kind.as_str())
    .bind(&notification.message)
    .bind(notification.read)
    .bind(notification.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .context("Failed to save notification")?;
    Ok(())
}

async fn ensure_wallet(conn: &mut SqliteConnection, user_id: UserId) -> Result<()> {
    let wallet = Wallet::new(user_id);
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO wallets (id, user_id, balance_cents, bank_last_four, created_at)
        VALUES (?, ?, 0, NULL, ?)
        "#,
    )
    .bind(wallet.id.to_string())
    .bind(user_id.to_string())
    .bind(wallet.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .context("Failed to create wallet")?;
    Ok(())
}

async fn fetch_wallet(conn: &mut SqliteConnection, user_id: UserId) -> Result<Wallet> {
    let row = sqlx::query(
        "SELECT id, user_id, balance_cents, bank_last_four, created_at FROM wallets WHERE user_id = ?",
    )
    .bind(user_id.to_string())
    .fetch_one(&mut *conn)
    .await
    .context("Failed to fetch wallet")?;

    Repository::row_to_wallet(&row)
}

fn parse_timestamp(value: &str, what: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid {} timestamp", what))?
        .with_timezone(&Utc))
}
