use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::PasswordHash;

pub type UserId = Uuid;

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    /// Display name
    pub name: String,
    #[serde(skip)]
    pub password_hash: PasswordHash,
    /// ISO 4217 code the user prefers to see amounts in
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        username: String,
        email: String,
        name: String,
        password_hash: PasswordHash,
        currency: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            name,
            password_hash,
            currency,
            created_at: Utc::now(),
        }
    }
}

/// Normalize a currency code: trimmed, upper-cased, exactly three ASCII letters.
pub fn normalize_currency(code: &str) -> Option<String> {
    let code = code.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Some(code.to_ascii_uppercase())
    } else {
        None
    }
}
