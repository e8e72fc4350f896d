//! The singleton scheduling rule.

use std::sync::Arc;

use tracing::{info, warn};

use rota_core::{Rule, RuleUpdate};

use crate::backend::RotaBackend;
use crate::error::StoreResult;

#[derive(Clone)]
pub struct RuleStore {
    backend: Arc<dyn RotaBackend>,
}

impl RuleStore {
    pub fn new(backend: Arc<dyn RotaBackend>) -> Self {
        Self { backend }
    }

    /// The stored rule. A missing row is seeded with defaults and read once
    /// more; if that still yields nothing, or the store fails, the defaults
    /// are returned without being persisted.
    pub async fn get(&self) -> Rule {
        match self.read_or_seed().await {
            Ok(Some(rule)) => rule,
            Ok(None) => {
                warn!("Rule row still missing after seeding, using defaults");
                Rule::default()
            }
            Err(e) => {
                warn!("Failed to read rules, using defaults: {}", e);
                Rule::default()
            }
        }
    }

    async fn read_or_seed(&self) -> StoreResult<Option<Rule>> {
        if let Some(rule) = self.backend.fetch_rule().await? {
            return Ok(Some(rule));
        }
        if self.backend.seed_rule(&Rule::default()).await? {
            info!("Initialized default scheduling rules");
        }
        self.backend.fetch_rule().await
    }

    /// Merge `update` over the current values (or the defaults when no row
    /// exists) and write the result.
    pub async fn update(&self, update: RuleUpdate) -> StoreResult<bool> {
        let current = self.backend.fetch_rule().await?.unwrap_or_default();
        let merged = update.apply_to(&current);
        merged.validate()?;
        self.backend.upsert_rule(&merged).await?;
        info!(
            max_days_per_week = merged.max_days_per_week,
            preferred_balance = merged.preferred_balance,
            "Scheduling rules updated"
        );
        Ok(true)
    }
}
