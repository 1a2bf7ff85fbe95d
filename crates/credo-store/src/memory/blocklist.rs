//! In-memory IP blocklist with per-entry expiry.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use credo_core::error::CoreResult;
use credo_core::repository::BlocklistStore;

use super::{read_guard, write_guard};

#[derive(Clone, Default)]
pub struct MemoryBlocklist {
    inner: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl MemoryBlocklist {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlocklistStore for MemoryBlocklist {
    async fn block(&self, ip: &str, until: DateTime<Utc>) -> CoreResult<()> {
        let mut map = write_guard(&self.inner)?;
        map.insert(ip.to_string(), until);
        Ok(())
    }

    async fn is_blocked(&self, ip: &str, now: DateTime<Utc>) -> CoreResult<bool> {
        let map = read_guard(&self.inner)?;
        Ok(map.get(ip).is_some_and(|until| *until > now))
    }

    async fn unblock(&self, ip: &str) -> CoreResult<()> {
        let mut map = write_guard(&self.inner)?;
        map.remove(ip);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn block_expires_on_its_own() {
        let list = MemoryBlocklist::new();
        let now = Utc::now();
        list.block("10.0.0.1", now + Duration::minutes(15)).await.unwrap();

        assert!(list.is_blocked("10.0.0.1", now).await.unwrap());
        assert!(!list.is_blocked("10.0.0.1", now + Duration::minutes(16)).await.unwrap());
        assert!(!list.is_blocked("10.0.0.2", now).await.unwrap());

        list.unblock("10.0.0.1").await.unwrap();
        assert!(!list.is_blocked("10.0.0.1", now).await.unwrap());
    }
}
