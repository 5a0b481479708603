use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, UserId};

pub type PaymentId = Uuid;

/// A settled movement of money from one user's wallet to another's.
/// Payments are immutable; a refund is simply a payment in the other direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    /// Sender (wallet balance decreases)
    pub from_user: UserId,
    /// Recipient (wallet balance increases)
    pub to_user: UserId,
    /// Amount in cents (always positive)
    pub amount_cents: Cents,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(from_user: UserId, to_user: UserId, amount_cents: Cents) -> Self {
        assert!(amount_cents > 0, "Payment amount must be positive");
        Self {
            id: Uuid::new_v4(),
            from_user,
            to_user,
            amount_cents,
            note: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Signed effect of this payment on `user`'s wallet.
    pub fn effect_on(&self, user: UserId) -> Cents {
        if self.to_user == user {
            self.amount_cents
        } else if self.from_user == user {
            -self.amount_cents
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_payment() {
        let (from, to) = (Uuid::new_v4(), Uuid::new_v4());
        let payment = Payment::new(from, to, 3000).with_note("dinner");

        assert_eq!(payment.amount_cents, 3000);
        assert_eq!(payment.note.as_deref(), Some("dinner"));
        assert_eq!(payment.effect_on(from), -3000);
        assert_eq!(payment.effect_on(to), 3000);
        assert_eq!(payment.effect_on(Uuid::new_v4()), 0);
    }

    #[test]
    #[should_panic(expected = "Payment amount must be positive")]
    fn test_payment_requires_positive_amount() {
        Payment::new(Uuid::new_v4(), Uuid::new_v4(), -5);
    }
}
