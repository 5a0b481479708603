use std::fmt::Write;

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A salted SHA-256 password digest stored as `salt$hexdigest`.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hash a clear-text password with a fresh random salt.
    pub fn from_password(password: &str) -> Self {
        let salt = Uuid::new_v4().simple().to_string();
        let digest = digest_hex(&salt, password);
        Self(format!("{}${}", salt, digest))
    }

    /// Wrap a value previously produced by [`PasswordHash::as_str`].
    pub fn from_stored(stored: String) -> Self {
        Self(stored)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn verify(&self, password: &str) -> bool {
        match self.0.split_once('$') {
            Some((salt, expected)) => {
                let actual = digest_hex(salt, password);
                // constant-time compare
                actual.len() == expected.len()
                    && actual
                        .bytes()
                        .zip(expected.bytes())
                        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                        == 0
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PasswordHash(..)")
    }
}

fn digest_hex(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .fold(String::with_capacity(64), |mut out, byte| {
            let _ = write!(out, "{:02x}", byte);
            out
        })
}
