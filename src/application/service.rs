use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

use crate::domain::{
    bank_token, compute_all_nets, compute_position, dedup_preserving_order, format_cents,
    normalize_currency, Cents, Expense, ExpenseId, ExpenseSplit, Group, GroupId,
    IntegrityReport, Notification, NotificationId, NotificationKind, PasswordHash, Payment, User,
    UserId, Wallet, DEFAULT_CURRENCY,
};
use crate::storage::{GroupDeletion, GroupLedger, Repository, SaveUserOutcome, TransferOutcome};

use super::{
    AppError, Dashboard, DashboardGroup, GroupBalance, HistoryEntry, HistoryFilter, MemberBalance,
};

/// Most recent notifications returned by [`LedgerService::list_notifications`].
pub const NOTIFICATION_LIMIT: usize = 50;

/// Application service providing the ledger operations.
/// Every call takes the acting user explicitly; the service keeps no session state.
pub struct LedgerService {
    repo: Repository,
}

/// Input for recording an expense
#[derive(Debug, Clone)]
pub struct NewExpense {
    pub title: String,
    pub amount_cents: Cents,
    pub group_id: Option<GroupId>,
    /// Overrides the group's membership when set
    pub participants: Option<Vec<UserId>>,
    /// Defaults to now
    pub occurred_at: Option<DateTime<Utc>>,
}

impl NewExpense {
    /// An expense shared by every member of a group.
    pub fn in_group(title: impl Into<String>, amount_cents: Cents, group_id: GroupId) -> Self {
        Self {
            title: title.into(),
            amount_cents,
            group_id: Some(group_id),
            participants: None,
            occurred_at: None,
        }
    }

    /// An expense outside any group, shared by an explicit list of users.
    pub fn ad_hoc(title: impl Into<String>, amount_cents: Cents, participants: Vec<UserId>) -> Self {
        Self {
            title: title.into(),
            amount_cents,
            group_id: None,
            participants: Some(participants),
            occurred_at: None,
        }
    }

    pub fn with_participants(mut self, participants: Vec<UserId>) -> Self {
        self.participants = Some(participants);
        self
    }

    pub fn occurred_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.occurred_at = Some(timestamp);
        self
    }
}

/// A group with its current members
#[derive(Debug, Clone)]
pub struct GroupDetails {
    pub group: Group,
    pub members: Vec<User>,
}

/// An expense with its splits
#[derive(Debug, Clone)]
pub struct ExpenseDetails {
    pub expense: Expense,
    pub splits: Vec<ExpenseSplit>,
}

impl ExpenseDetails {
    pub fn share_of(&self, user_id: UserId) -> Option<Cents> {
        self.splits
            .iter()
            .find(|s| s.user_id == user_id)
            .map(|s| s.amount_cents)
    }
}

/// Summary of a group deletion
#[derive(Debug, Clone)]
pub struct DeletedGroup {
    pub group: Group,
    pub expenses_deleted: u64,
    pub splits_deleted: u64,
}

/// Result of paying another user
#[derive(Debug, Clone)]
pub struct PaymentResult {
    pub payment: Payment,
    pub from_name: String,
    pub to_name: String,
    /// Sender's balance after the payment
    pub remaining_balance: Cents,
}

impl LedgerService {
    /// Create a new ledger service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a database at the given path, creating it if needed.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        log::debug!("Initialized database at {}", database_path);
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // User operations
    // ========================

    /// Register a new user.
    pub async fn register_user(
        &self,
        username: &str,
        email: &str,
        name: &str,
        password: &str,
        currency: Option<&str>,
    ) -> Result<User, AppError> {
        let username = username.trim();
        let email = email.trim().to_lowercase();
        let name = name.trim();

        if username.chars().count() < 3 {
            return Err(AppError::InvalidInput(
                "Username must be at least 3 characters".to_string(),
            ));
        }
        if !email.contains('@') {
            return Err(AppError::InvalidInput("Invalid email format".to_string()));
        }
        if password.chars().count() < 6 {
            return Err(AppError::InvalidInput(
                "Password must be at least 6 characters".to_string(),
            ));
        }
        if name.is_empty() {
            return Err(AppError::InvalidInput("Name is required".to_string()));
        }
        let currency = normalize_currency(currency.unwrap_or(DEFAULT_CURRENCY)).ok_or_else(|| {
            AppError::InvalidInput("Currency must be a three-letter code".to_string())
        })?;

        if self.repo.get_user_by_username(username).await?.is_some() {
            return Err(AppError::UsernameTaken(username.to_string()));
        }
        if self.repo.get_user_by_email(&email).await?.is_some() {
            return Err(AppError::EmailTaken(email));
        }

        let user = User::new(
            username.to_string(),
            email,
            name.to_string(),
            PasswordHash::from_password(password),
            currency,
        );
        match self.repo.save_user(&user).await? {
            SaveUserOutcome::Saved => {}
            SaveUserOutcome::UsernameTaken => {
                return Err(AppError::UsernameTaken(user.username));
            }
            SaveUserOutcome::EmailTaken => return Err(AppError::EmailTaken(user.email)),
        }

        log::info!("Registered user {} ({})", user.username, user.id);
        Ok(user)
    }

    /// Check a username/password pair and return the matching user.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AppError> {
        match self.repo.get_user_by_username(username.trim()).await? {
            Some(user) if user.password_hash.verify(password) => Ok(user),
            _ => {
                log::warn!("Failed login attempt for {}", username.trim());
                Err(AppError::InvalidCredentials)
            }
        }
    }

    pub async fn get_user(&self, id: UserId) -> Result<User, AppError> {
        self.repo
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::UserNotFound(id.to_string()))
    }

    pub async fn find_user(&self, username: &str) -> Result<User, AppError> {
        self.repo
            .get_user_by_username(username)
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.repo.list_users().await?)
    }

    // ========================
    // Group operations
    // ========================

    /// Create a group with the caller as its first member.
    /// Listed members that don't exist are skipped.
    pub async fn create_group(
        &self,
        caller: UserId,
        name: &str,
        member_ids: &[UserId],
    ) -> Result<GroupDetails, AppError> {
        let creator = self.get_user(caller).await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Group name is required".to_string()));
        }

        let mut members = vec![caller];
        members.extend(self.existing_users(member_ids).await?);
        let members = dedup_preserving_order(&members);

        let group = Group::new(name.to_string());
        let notice = format!("{} added you to group '{}'", creator.name, group.name);
        self.repo
            .create_group(&group, &members, &notice, caller)
            .await?;

        log::info!(
            "User {} created group '{}' ({}) with {} member(s)",
            creator.username,
            group.name,
            group.id,
            members.len()
        );

        let members = self.repo.list_group_members(group.id).await?;
        Ok(GroupDetails { group, members })
    }

    /// Add users to a group the caller belongs to.
    /// Unknown ids and existing members are ignored. Returns the ids actually added.
    pub async fn add_members(
        &self,
        caller: UserId,
        group_id: GroupId,
        member_ids: &[UserId],
    ) -> Result<Vec<UserId>, AppError> {
        let group = self.require_member(group_id, caller).await?;
        let actor = self.get_user(caller).await?;

        let candidates = self.existing_users(member_ids).await?;
        let notice = format!("{} added you to group '{}'", actor.name, group.name);
        let added = self
            .repo
            .add_members(group_id, &candidates, &notice, caller)
            .await?;

        log::info!(
            "User {} added {} member(s) to group {}",
            actor.username,
            added.len(),
            group_id
        );
        Ok(added)
    }

    /// Delete a group and everything it owns. Any member may do this.
    pub async fn delete_group(
        &self,
        caller: UserId,
        group_id: GroupId,
    ) -> Result<DeletedGroup, AppError> {
        let group = self.require_group(group_id).await?;
        let (expenses_deleted, splits_deleted) =
            match self.repo.delete_group(group_id, caller).await? {
                GroupDeletion::Deleted { expenses, splits } => (expenses, splits),
                GroupDeletion::NotMember => {
                    return Err(AppError::NotGroupMember {
                        user: caller.to_string(),
                        group: group_id.to_string(),
                    });
                }
                GroupDeletion::GroupNotFound => {
                    return Err(AppError::GroupNotFound(group_id.to_string()));
                }
            };

        log::info!(
            "Group '{}' ({}) deleted by {}: {} expense(s), {} split(s) removed",
            group.name,
            group.id,
            caller,
            expenses_deleted,
            splits_deleted
        );
        Ok(DeletedGroup {
            group,
            expenses_deleted,
            splits_deleted,
        })
    }

    pub async fn get_group(
        &self,
        caller: UserId,
        group_id: GroupId,
    ) -> Result<GroupDetails, AppError> {
        let group = self.require_member(group_id, caller).await?;
        let members = self.repo.list_group_members(group_id).await?;
        Ok(GroupDetails { group, members })
    }

    /// Groups the caller belongs to, by name.
    pub async fn list_groups(&self, caller: UserId) -> Result<Vec<Group>, AppError> {
        Ok(self.repo.list_groups_for_user(caller).await?)
    }

    async fn require_group(&self, group_id: GroupId) -> Result<Group, AppError> {
        self.repo
            .get_group(group_id)
            .await?
            .ok_or_else(|| AppError::GroupNotFound(group_id.to_string()))
    }

    async fn require_member(&self, group_id: GroupId, user_id: UserId) -> Result<Group, AppError> {
        let group = self.require_group(group_id).await?;
        if !self.repo.is_member(group_id, user_id).await? {
            return Err(AppError::NotGroupMember {
                user: user_id.to_string(),
                group: group_id.to_string(),
            });
        }
        Ok(group)
    }

    async fn existing_users(&self, ids: &[UserId]) -> Result<Vec<UserId>, AppError> {
        let mut found = Vec::new();
        for id in dedup_preserving_order(ids) {
            if self.repo.get_user(id).await?.is_some() {
                found.push(id);
            } else {
                log::debug!("Skipping unknown user {}", id);
            }
        }
        Ok(found)
    }

    // ========================
    // Expense operations
    // ========================

    /// Record an expense paid by the caller and split it equally.
    pub async fn record_expense(
        &self,
        caller: UserId,
        new: NewExpense,
    ) -> Result<ExpenseDetails, AppError> {
        let title = new.title.trim();
        if title.is_empty() {
            return Err(AppError::InvalidInput("Expense title is required".to_string()));
        }
        if new.amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        let payer = self.get_user(caller).await?;

        let participants = match (new.group_id, new.participants) {
            (Some(group_id), participants) => {
                self.require_member(group_id, caller).await?;
                match participants {
                    Some(list) => self.require_users(&list).await?,
                    None => self
                        .repo
                        .list_group_members(group_id)
                        .await?
                        .into_iter()
                        .map(|u| u.id)
                        .collect(),
                }
            }
            (None, Some(list)) => self.require_users(&list).await?,
            (None, None) => Vec::new(),
        };

        if participants.is_empty() {
            return Err(AppError::InvalidInput(
                "Expense needs at least one participant".to_string(),
            ));
        }
        if new.amount_cents < participants.len() as Cents {
            return Err(AppError::InvalidAmount(format!(
                "{} is too small to split between {} participants",
                format_cents(new.amount_cents),
                participants.len()
            )));
        }

        let expense = Expense::new(
            title.to_string(),
            new.amount_cents,
            caller,
            new.group_id,
            new.occurred_at.unwrap_or_else(Utc::now),
        );
        let splits = expense.split_equally(&participants);

        let notifications: Vec<Notification> = splits
            .iter()
            .filter(|s| s.user_id != caller)
            .map(|s| {
                Notification::new(
                    s.user_id,
                    NotificationKind::Expense,
                    format!(
                        "{} added '{}': your share is {}",
                        payer.name,
                        expense.title,
                        format_cents(s.amount_cents)
                    ),
                )
            })
            .collect();

        self.repo
            .save_expense(&expense, &splits, &notifications)
            .await?;

        log::info!(
            "Recorded expense '{}' ({}) of {} paid by {}, split {} way(s)",
            expense.title,
            expense.id,
            format_cents(expense.amount_cents),
            payer.username,
            splits.len()
        );
        Ok(ExpenseDetails { expense, splits })
    }

    /// Fetch an expense with its splits. Visible to the payer, to anyone with a
    /// split, and to members of the owning group.
    pub async fn get_expense(
        &self,
        caller: UserId,
        expense_id: ExpenseId,
    ) -> Result<ExpenseDetails, AppError> {
        let expense = self.require_expense(expense_id).await?;
        let splits = self.repo.list_splits_for_expense(expense_id).await?;

        let involved = expense.paid_by == caller || splits.iter().any(|s| s.user_id == caller);
        if !involved && !self.is_group_member(expense.group_id, caller).await? {
            return Err(AppError::NotExpenseParticipant {
                user: caller.to_string(),
                expense: expense_id.to_string(),
            });
        }

        Ok(ExpenseDetails { expense, splits })
    }

    /// Delete an expense and its splits. Allowed for the payer and for members
    /// of the owning group. Returns the number of splits removed.
    pub async fn delete_expense(
        &self,
        caller: UserId,
        expense_id: ExpenseId,
    ) -> Result<u64, AppError> {
        let expense = self.require_expense(expense_id).await?;

        if expense.paid_by != caller && !self.is_group_member(expense.group_id, caller).await? {
            return Err(AppError::NotExpenseParticipant {
                user: caller.to_string(),
                expense: expense_id.to_string(),
            });
        }

        let splits = self.repo.delete_expense(expense_id).await?;
        log::info!(
            "Expense '{}' ({}) deleted by {}",
            expense.title,
            expense.id,
            caller
        );
        Ok(splits)
    }

    /// Expenses of a group, newest first.
    pub async fn list_group_expenses(
        &self,
        caller: UserId,
        group_id: GroupId,
    ) -> Result<Vec<Expense>, AppError> {
        self.require_member(group_id, caller).await?;
        Ok(self.repo.list_expenses_for_group(group_id).await?)
    }

    async fn require_expense(&self, expense_id: ExpenseId) -> Result<Expense, AppError> {
        self.repo
            .get_expense(expense_id)
            .await?
            .ok_or_else(|| AppError::ExpenseNotFound(expense_id.to_string()))
    }

    async fn is_group_member(
        &self,
        group_id: Option<GroupId>,
        user_id: UserId,
    ) -> Result<bool, AppError> {
        match group_id {
            Some(gid) => Ok(self.repo.is_member(gid, user_id).await?),
            None => Ok(false),
        }
    }

    /// Every id must name an existing user. Duplicates collapse.
    async fn require_users(&self, ids: &[UserId]) -> Result<Vec<UserId>, AppError> {
        let ids = dedup_preserving_order(ids);
        for id in &ids {
            self.get_user(*id).await?;
        }
        Ok(ids)
    }

    // ========================
    // Balance queries
    // ========================

    /// The caller's position in one group, computed from current expenses.
    pub async fn group_balance(
        &self,
        caller: UserId,
        group_id: GroupId,
    ) -> Result<GroupBalance, AppError> {
        let ledger = self.member_ledger(group_id, caller).await?;

        let position = compute_position(caller, &ledger.expenses, &ledger.splits);
        Ok(GroupBalance {
            group: ledger.group,
            position,
            net: position.net(),
        })
    }

    /// Net of everyone involved in the group's expenses. Members come first,
    /// then anyone named on an expense who is not a member. Nets sum to zero.
    pub async fn group_balances(
        &self,
        caller: UserId,
        group_id: GroupId,
    ) -> Result<Vec<MemberBalance>, AppError> {
        let ledger = self.member_ledger(group_id, caller).await?;

        let mut nets = compute_all_nets(&ledger.expenses, &ledger.splits);
        let member_ids: HashSet<UserId> = ledger.members.iter().map(|u| u.id).collect();

        let mut balances: Vec<MemberBalance> = ledger
            .members
            .into_iter()
            .map(|user| MemberBalance {
                net: nets.remove(&user.id).unwrap_or(0),
                is_member: true,
                user,
            })
            .collect();

        let mut outsiders: Vec<(UserId, Cents)> = nets
            .into_iter()
            .filter(|(id, _)| !member_ids.contains(id))
            .collect();
        outsiders.sort_by_key(|(id, _)| *id);
        for (user_id, net) in outsiders {
            balances.push(MemberBalance {
                user: self.get_user(user_id).await?,
                is_member: false,
                net,
            });
        }

        Ok(balances)
    }

    /// Sum of the caller's nets across all their groups.
    pub async fn dashboard(&self, caller: UserId) -> Result<Dashboard, AppError> {
        self.get_user(caller).await?;
        let ledgers = self.repo.list_group_ledgers_for_user(caller).await?;

        let groups: Vec<DashboardGroup> = ledgers
            .into_iter()
            .map(|ledger| {
                let position = compute_position(caller, &ledger.expenses, &ledger.splits);
                DashboardGroup {
                    member_count: ledger.members.len(),
                    group: ledger.group,
                    position,
                    net: position.net(),
                }
            })
            .collect();

        Ok(Dashboard {
            balance: groups.iter().map(|g| g.net).sum(),
            groups,
        })
    }

    /// One consistent read of a group, checked for the caller's membership
    /// against that same read.
    async fn member_ledger(&self, group_id: GroupId, caller: UserId) -> Result<GroupLedger, AppError> {
        let ledger = self
            .repo
            .get_group_ledger(group_id)
            .await?
            .ok_or_else(|| AppError::GroupNotFound(group_id.to_string()))?;
        if !ledger.has_member(caller) {
            return Err(AppError::NotGroupMember {
                user: caller.to_string(),
                group: group_id.to_string(),
            });
        }
        Ok(ledger)
    }

    // ========================
    // History
    // ========================

    /// Expenses the caller paid or shares in, newest first.
    pub async fn transaction_history(
        &self,
        caller: UserId,
        filter: HistoryFilter,
    ) -> Result<Vec<HistoryEntry>, AppError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let rows = self
            .repo
            .list_history(caller, filter.group, search, filter.limit)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| HistoryEntry {
                expense_id: row.expense.id,
                is_owed: row.expense.paid_by != caller,
                your_share: row.share_cents.unwrap_or(0),
                title: row.expense.title,
                group_id: row.expense.group_id,
                group_name: row.group_name,
                paid_by: row.expense.paid_by,
                paid_by_name: row.payer_name,
                amount_cents: row.expense.amount_cents,
                occurred_at: row.expense.occurred_at,
            })
            .collect())
    }

    // ========================
    // Wallet operations
    // ========================

    /// The caller's wallet. A user who never used the wallet sees an empty one;
    /// nothing is written.
    pub async fn get_wallet(&self, caller: UserId) -> Result<Wallet, AppError> {
        self.get_user(caller).await?;
        Ok(self
            .repo
            .get_wallet(caller)
            .await?
            .unwrap_or_else(|| Wallet::new(caller)))
    }

    /// Add simulated funds to the caller's wallet.
    pub async fn load_balance(&self, caller: UserId, amount_cents: Cents) -> Result<Wallet, AppError> {
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be greater than 0".to_string(),
            ));
        }
        self.get_user(caller).await?;

        let wallet = self.repo.credit_wallet(caller, amount_cents).await?;
        log::info!(
            "Loaded {} into wallet of {}; balance now {}",
            format_cents(amount_cents),
            caller,
            format_cents(wallet.balance_cents)
        );
        Ok(wallet)
    }

    /// Link a bank account to the caller's wallet. Only the last four digits are kept.
    pub async fn link_bank(&self, caller: UserId, account_number: &str) -> Result<Wallet, AppError> {
        let last_four = bank_token(account_number).ok_or_else(|| {
            AppError::InvalidInput("Account number must contain at least 4 digits".to_string())
        })?;
        self.get_user(caller).await?;

        let wallet = self.repo.set_bank_last_four(caller, &last_four).await?;
        log::info!("Linked bank account ****{} for {}", last_four, caller);
        Ok(wallet)
    }

    /// Pay another user from the caller's wallet.
    pub async fn pay_user(
        &self,
        caller: UserId,
        recipient: UserId,
        amount_cents: Cents,
        note: Option<String>,
    ) -> Result<PaymentResult, AppError> {
        if amount_cents <= 0 {
            return Err(AppError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }
        if recipient == caller {
            return Err(AppError::SelfPayment);
        }

        let sender = self.get_user(caller).await?;
        let payee = self.get_user(recipient).await?;

        let balance = self.wallet_balance(caller).await?;
        if balance < amount_cents {
            return Err(AppError::InsufficientFunds {
                balance,
                required: amount_cents,
            });
        }

        let mut payment = Payment::new(caller, recipient, amount_cents);
        if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
            payment = payment.with_note(note.trim());
        }
        let notification = Notification::new(
            recipient,
            NotificationKind::Payment,
            format!("{} paid you {}", sender.name, format_cents(amount_cents)),
        );

        match self.repo.transfer(&payment, &notification).await? {
            TransferOutcome::Completed => {}
            TransferOutcome::InsufficientFunds => {
                // balance changed since the check above
                return Err(AppError::InsufficientFunds {
                    balance: self.wallet_balance(caller).await?,
                    required: amount_cents,
                });
            }
        }

        let remaining_balance = self.wallet_balance(caller).await?;
        log::info!(
            "{} paid {} to {} ({})",
            sender.username,
            format_cents(amount_cents),
            payee.username,
            payment.id
        );

        Ok(PaymentResult {
            payment,
            from_name: sender.name,
            to_name: payee.name,
            remaining_balance,
        })
    }

    /// Payments the caller sent or received, newest first.
    pub async fn list_payments(&self, caller: UserId) -> Result<Vec<Payment>, AppError> {
        Ok(self.repo.list_payments_for_user(caller).await?)
    }

    /// Money held across every wallet. Payments never change it.
    pub async fn total_wallet_balance(&self) -> Result<Cents, AppError> {
        Ok(self.repo.total_wallet_balance().await?)
    }

    async fn wallet_balance(&self, user_id: UserId) -> Result<Cents, AppError> {
        Ok(self
            .repo
            .get_wallet(user_id)
            .await?
            .map(|w| w.balance_cents)
            .unwrap_or(0))
    }

    // ========================
    // Notifications
    // ========================

    pub async fn list_notifications(&self, caller: UserId) -> Result<Vec<Notification>, AppError> {
        Ok(self
            .repo
            .list_notifications(caller, NOTIFICATION_LIMIT)
            .await?)
    }

    pub async fn mark_notification_read(
        &self,
        caller: UserId,
        id: NotificationId,
    ) -> Result<(), AppError> {
        if !self.repo.mark_notification_read(id, caller).await? {
            return Err(AppError::NotificationNotFound(id.to_string()));
        }
        Ok(())
    }

    // ========================
    // Integrity operations
    // ========================

    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        Ok(self.repo.get_integrity_report().await?)
    }

    /// Map of user ids to display names (useful for display).
    pub async fn get_user_names(&self) -> Result<HashMap<UserId, String>, AppError> {
        let users = self.repo.list_users().await?;
        Ok(users.into_iter().map(|u| (u.id, u.name)).collect())
    }
}
