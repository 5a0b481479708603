use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, UserId};

pub type WalletId = Uuid;

/// A user's simulated cash balance, used to settle debts with other users.
/// Wallets are created lazily on first load or first incoming payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub balance_cents: Cents,
    /// Last four digits of a linked bank account, never the full number
    pub bank_last_four: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Wallet {
    pub fn new(user_id: UserId) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            balance_cents: 0,
            bank_last_four: None,
            created_at: Utc::now(),
        }
    }

    pub fn has_linked_bank(&self) -> bool {
        self.bank_last_four.is_some()
    }

    pub fn can_cover(&self, amount_cents: Cents) -> bool {
        self.balance_cents >= amount_cents
    }
}

/// Reduce a bank account number to the last-four token we keep.
/// Spaces and dashes are ignored; anything else non-numeric is rejected,
/// as are numbers shorter than four digits.
pub fn bank_token(account_number: &str) -> Option<String> {
    let mut digits = String::with_capacity(account_number.len());
    for c in account_number.trim().chars() {
        match c {
            '0'..='9' => digits.push(c),
            ' ' | '-' => {}
            _ => return None,
        }
    }
    if digits.len() < 4 {
        return None;
    }
    Some(digits[digits.len() - 4..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_wallet_is_empty() {
        let wallet = Wallet::new(Uuid::new_v4());
        assert_eq!(wallet.balance_cents, 0);
        assert!(!wallet.has_linked_bank());
        assert!(wallet.can_cover(0));
        assert!(!wallet.can_cover(1));
    }

    #[test]
    fn test_bank_token_keeps_last_four() {
        assert_eq!(bank_token("123456789012"), Some("9012".to_string()));
        assert_eq!(bank_token("1234-5678 9012 3456"), Some("3456".to_string()));
        assert_eq!(bank_token("0042"), Some("0042".to_string()));
    }

    #[test]
    fn test_bank_token_rejects_bad_input() {
        assert_eq!(bank_token("123"), None);
        assert_eq!(bank_token(""), None);
        assert_eq!(bank_token("12a4567"), None);
        assert_eq!(bank_token("--  --"), None);
    }
}
