use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

pub type NotificationId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    /// Someone paid you
    Payment,
    /// You have a share in a new expense
    Expense,
    /// You were added to a group
    Group,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Payment => "payment",
            NotificationKind::Expense => "expense",
            NotificationKind::Group => "group",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "info" => Some(NotificationKind::Info),
            "payment" => Some(NotificationKind::Payment),
            "expense" => Some(NotificationKind::Expense),
            "group" => Some(NotificationKind::Group),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: UserId, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            message: message.into(),
            read: false,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            NotificationKind::Info,
            NotificationKind::Payment,
            NotificationKind::Expense,
            NotificationKind::Group,
        ] {
            assert_eq!(NotificationKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::from_str("PAYMENT"), Some(NotificationKind::Payment));
        assert_eq!(NotificationKind::from_str("spam"), None);
    }

    #[test]
    fn test_new_notification_is_unread() {
        let n = Notification::new(Uuid::new_v4(), NotificationKind::Info, "hello");
        assert!(!n.read);
        assert_eq!(n.message, "hello");
    }
}
