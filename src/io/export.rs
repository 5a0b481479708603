use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::{HistoryEntry, HistoryFilter, LedgerService};
use crate::domain::{GroupId, UserId};

/// History snapshot for JSON export
#[derive(Debug, Clone, Serialize)]
pub struct HistorySnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub user: String,
    pub entries: Vec<HistoryEntry>,
}

/// Exporter for writing one user's ledger data to CSV or JSON
pub struct Exporter<'a> {
    service: &'a LedgerService,
    user: UserId,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a LedgerService, user: UserId) -> Self {
        Self { service, user }
    }

    /// Export the user's transaction history to CSV format
    pub async fn export_history_csv<W: Write>(
        &self,
        writer: W,
        filter: HistoryFilter,
    ) -> Result<usize> {
        let entries = self.service.transaction_history(self.user, filter).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "date",
            "title",
            "group",
            "paid_by",
            "amount_cents",
            "your_share_cents",
            "direction",
        ])?;

        for entry in &entries {
            csv_writer.write_record([
                entry.expense_id.to_string(),
                entry.occurred_at.to_rfc3339(),
                entry.title.clone(),
                entry.group_name.clone().unwrap_or_default(),
                entry.paid_by_name.clone(),
                entry.amount_cents.to_string(),
                entry.your_share.to_string(),
                if entry.is_owed { "owe" } else { "paid" }.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(entries.len())
    }

    /// Export the user's transaction history as a JSON snapshot
    pub async fn export_history_json<W: Write>(
        &self,
        mut writer: W,
        filter: HistoryFilter,
    ) -> Result<HistorySnapshot> {
        let user = self.service.get_user(self.user).await?;
        let entries = self.service.transaction_history(self.user, filter).await?;

        let snapshot = HistorySnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            user: user.username,
            entries,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }

    /// Export every member's net in a group to CSV format
    pub async fn export_balances_csv<W: Write>(&self, writer: W, group: GroupId) -> Result<usize> {
        let balances = self.service.group_balances(self.user, group).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["username", "name", "member", "net_cents"])?;

        for balance in &balances {
            csv_writer.write_record([
                balance.user.username.as_str(),
                balance.user.name.as_str(),
                if balance.is_member { "yes" } else { "no" },
                balance.net.to_string().as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(balances.len())
    }
}
