use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{Cents, ExpenseId, Group, GroupId, Position, User, UserId};

/// The caller's position in one group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupBalance {
    pub group: Group,
    pub position: Position,
    pub net: Cents,
}

/// One user's net within a group, as part of a whole-group view.
#[derive(Debug, Clone, Serialize)]
pub struct MemberBalance {
    pub user: User,
    /// False for someone who was named on an expense but is not (or no longer) a member
    pub is_member: bool,
    pub net: Cents,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardGroup {
    pub group: Group,
    pub member_count: usize,
    pub position: Position,
    pub net: Cents,
}

/// The caller's overall position: sum of group nets plus a per-group breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub balance: Cents,
    pub groups: Vec<DashboardGroup>,
}

/// One expense from the caller's point of view.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub expense_id: ExpenseId,
    pub title: String,
    pub group_id: Option<GroupId>,
    pub group_name: Option<String>,
    pub paid_by: UserId,
    pub paid_by_name: String,
    pub amount_cents: Cents,
    /// The caller's own share, zero when they paid but did not participate
    pub your_share: Cents,
    /// True when someone else paid, i.e. the caller owes `your_share`
    pub is_owed: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Filter for the transaction history
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub group: Option<GroupId>,
    /// Case-insensitive substring of the expense title
    pub search: Option<String>,
    pub limit: Option<usize>,
}
