use chrono::Utc;

use crate::error::{HealthError, Result};
use crate::model::{VitalsEntry, VitalsInput};
use crate::session::{derived_id, SessionContext};
use crate::store::Repository;

const DEFAULT_PATIENT_NAME: &str = "Patient";

/// Append-only vitals history for the session's derived identifier.
pub struct VitalsLedger<'a> {
    repo: &'a Repository,
    ctx: &'a SessionContext,
}

impl<'a> VitalsLedger<'a> {
    pub fn new(repo: &'a Repository, ctx: &'a SessionContext) -> Self {
        Self { repo, ctx }
    }

    /// Only the two pressure values are required. Everything else is
    /// stored as typed, without numeric checks.
    pub async fn append_entry(&self, input: VitalsInput) -> Result<VitalsEntry> {
        let systolic = input.systolic.trim();
        let diastolic = input.diastolic.trim();
        if systolic.is_empty() || diastolic.is_empty() {
            return Err(HealthError::validation("Enter BP values"));
        }

        let name = match input.name.trim() {
            "" => self
                .ctx
                .user
                .as_ref()
                .map(|u| u.name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_PATIENT_NAME.to_string()),
            given => given.to_string(),
        };
        let entry = VitalsEntry {
            name,
            bp: format!("{}/{}", systolic, diastolic),
            sugar: input.sugar.trim().to_string(),
            pulse: input.pulse.trim().to_string(),
            weight: input.weight.trim().to_string(),
            ts: Utc::now().timestamp_millis(),
        };

        let id = self.ledger_id().await?;
        let mut entries = self.repo.ledger_for(&id).await?;
        entries.push(entry.clone());
        self.repo.save_ledger(&id, &entries).await?;
        log::debug!("📈 Ledger {} now holds {} entries", id, entries.len());
        Ok(entry)
    }

    /// Insertion order, oldest first.
    pub async fn list_entries(&self) -> Result<Vec<VitalsEntry>> {
        let id = self.ledger_id().await?;
        self.repo.ledger_for(&id).await
    }

    pub async fn latest(&self) -> Result<Option<VitalsEntry>> {
        Ok(self.list_entries().await?.pop())
    }

    async fn ledger_id(&self) -> Result<String> {
        derived_id(self.repo, self.ctx).await
    }
}
