//! Plan/entitlement collaborator
//!
//! Plan ceilings are policy values supplied from outside the orchestrator.
//! `ConfigPlanProvider` resolves them from service configuration; a
//! billing-service client would slot in behind the same trait.

use async_trait::async_trait;
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::Result;

/// Per-plan concurrency ceilings.
#[derive(Debug, Clone, Copy)]
pub struct PlanCeilings {
    pub max_concurrent_streams: i64,
    pub max_concurrent_viewers: i32,
}

#[async_trait]
pub trait PlanProvider: Send + Sync {
    async fn is_premium(&self, owner_id: Uuid) -> Result<bool>;

    async fn max_concurrent_streams(&self, owner_id: Uuid) -> Result<i64>;

    async fn max_concurrent_viewers(&self, owner_id: Uuid) -> Result<i32>;
}

/// Entitlements resolved from static configuration: a premium owner set
/// plus free/premium tier ceilings.
pub struct ConfigPlanProvider {
    premium_owners: HashSet<Uuid>,
    free: PlanCeilings,
    premium: PlanCeilings,
}

impl ConfigPlanProvider {
    pub fn new(premium_owners: HashSet<Uuid>, free: PlanCeilings, premium: PlanCeilings) -> Self {
        Self {
            premium_owners,
            free,
            premium,
        }
    }

    fn ceilings_for(&self, owner_id: Uuid) -> PlanCeilings {
        if self.premium_owners.contains(&owner_id) {
            self.premium
        } else {
            self.free
        }
    }
}

#[async_trait]
impl PlanProvider for ConfigPlanProvider {
    async fn is_premium(&self, owner_id: Uuid) -> Result<bool> {
        Ok(self.premium_owners.contains(&owner_id))
    }

    async fn max_concurrent_streams(&self, owner_id: Uuid) -> Result<i64> {
        Ok(self.ceilings_for(owner_id).max_concurrent_streams)
    }

    async fn max_concurrent_viewers(&self, owner_id: Uuid) -> Result<i32> {
        Ok(self.ceilings_for(owner_id).max_concurrent_viewers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(premium_owner: Uuid) -> ConfigPlanProvider {
        ConfigPlanProvider::new(
            HashSet::from([premium_owner]),
            PlanCeilings {
                max_concurrent_streams: 1,
                max_concurrent_viewers: 100,
            },
            PlanCeilings {
                max_concurrent_streams: 5,
                max_concurrent_viewers: 10_000,
            },
        )
    }

    #[tokio::test]
    async fn premium_owners_get_premium_ceilings() {
        let owner = Uuid::new_v4();
        let plans = provider(owner);

        assert!(plans.is_premium(owner).await.unwrap());
        assert_eq!(plans.max_concurrent_streams(owner).await.unwrap(), 5);
        assert_eq!(plans.max_concurrent_viewers(owner).await.unwrap(), 10_000);
    }

    #[tokio::test]
    async fn unknown_owners_fall_back_to_free_tier() {
        let plans = provider(Uuid::new_v4());
        let other = Uuid::new_v4();

        assert!(!plans.is_premium(other).await.unwrap());
        assert_eq!(plans.max_concurrent_streams(other).await.unwrap(), 1);
        assert_eq!(plans.max_concurrent_viewers(other).await.unwrap(), 100);
    }
}
