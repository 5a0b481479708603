// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use pennypals::application::LedgerService;
use pennypals::domain::{GroupId, User};
use tempfile::TempDir;

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = LedgerService::init(db_path.to_str().unwrap()).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Register a user whose email and password derive from the username
pub async fn register(service: &LedgerService, username: &str) -> Result<User> {
    let name = {
        let mut chars = username.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
            None => String::new(),
        }
    };
    let user = service
        .register_user(
            username,
            &format!("{}@example.com", username),
            &name,
            "password123",
            None,
        )
        .await?;
    Ok(user)
}

/// Test fixture: three friends sharing one group
pub struct Trip {
    pub ana: User,
    pub ben: User,
    pub cat: User,
    pub group: GroupId,
}

impl Trip {
    pub async fn create(service: &LedgerService) -> Result<Self> {
        let ana = register(service, "ana").await?;
        let ben = register(service, "ben").await?;
        let cat = register(service, "cat").await?;
        let details = service
            .create_group(ana.id, "Lisbon Trip", &[ben.id, cat.id])
            .await?;
        Ok(Self {
            ana,
            ben,
            cat,
            group: details.group.id,
        })
    }
}
