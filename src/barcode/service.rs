use std::sync::Arc;

use chrono::{Duration, Utc};

use super::{CodeGenerator, LOGICAL_TTL_SECS, PHYSICAL_TTL_SECS};
use crate::errors::AppError;
use crate::metrics::{self, LookupOutcome};
use crate::models::barcode::{dto_key, status_key, Barcode, USED_MARKER};
use crate::store::TtlStore;

/// Owns the dual-TTL policy and every read and write against the store.
pub struct BarcodeService {
    store: Arc<dyn TtlStore>,
    codes: CodeGenerator,
}

impl BarcodeService {
    pub fn new(store: Arc<dyn TtlStore>, codes: CodeGenerator) -> Self {
        Self { store, codes }
    }

    /// Issue a barcode for `user_id`.
    ///
    /// The returned snapshot is the only place `physical_expire_at` is ever
    /// shown to a caller.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn generate(&self, user_id: &str) -> Result<Barcode, AppError> {
        let now = Utc::now();
        let code = self
            .codes
            .generate(user_id, now.timestamp_millis().max(0) as u64);

        let barcode = Barcode {
            user_id: user_id.to_string(),
            code: code.clone(),
            logical_expire_at: now + Duration::seconds(LOGICAL_TTL_SECS as i64),
            physical_expire_at: Some(now + Duration::seconds(PHYSICAL_TTL_SECS as i64)),
            status: true,
        };

        let snapshot = serde_json::to_string(&barcode)?;
        let records = [
            (status_key(&code), code.clone()),
            (dto_key(&code), snapshot),
        ];
        self.store.set_many(&records, PHYSICAL_TTL_SECS).await?;

        metrics::record_issued();
        tracing::info!(code = %code, ttl_secs = PHYSICAL_TTL_SECS, "barcode issued");
        Ok(barcode)
    }

    /// Look up a barcode with its current status.
    ///
    /// Returns `None` when the status record is gone, and also when the
    /// metadata record is missing or unreadable.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, code: &str) -> Result<Option<Barcode>, AppError> {
        if self.store.get(&status_key(code)).await?.is_none() {
            metrics::record_lookup(LookupOutcome::NotFound);
            return Ok(None);
        }

        let Some(json) = self.store.get(&dto_key(code)).await? else {
            tracing::warn!(code, "status record has no metadata record");
            metrics::record_lookup(LookupOutcome::Inconsistent);
            return Ok(None);
        };

        let mut barcode: Barcode = match serde_json::from_str(&json) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(code, error = %e, "unreadable metadata record");
                metrics::record_lookup(LookupOutcome::Inconsistent);
                return Ok(None);
            }
        };

        barcode.status = self.check_status(code).await?;
        barcode.physical_expire_at = None;

        metrics::record_lookup(LookupOutcome::Found);
        Ok(Some(barcode))
    }

    /// Mark a barcode as used.
    ///
    /// Keeps the status record's remaining TTL. A code with no remaining TTL
    /// (never issued, or already expired) gets a permanent `used` marker.
    /// Calling this again is harmless.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn redeem(&self, code: &str) -> Result<(), AppError> {
        let previous_ttl = self.store.set_keep_ttl(&status_key(code), USED_MARKER).await?;

        match previous_ttl {
            Some(secs) => {
                tracing::info!(code, ttl_secs = secs, "barcode redeemed");
            }
            None => {
                tracing::info!(code, "barcode redeemed with no remaining ttl; marker is permanent");
            }
        }

        metrics::record_redeemed();
        Ok(())
    }

    /// Whether the barcode can still be used.
    ///
    /// Only the status record's remaining store TTL is consulted, so a code
    /// stays valid through the buffer after `logical_expire_at`.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn is_valid(&self, code: &str) -> Result<bool, AppError> {
        let valid = self.check_status(code).await?;
        metrics::record_validation(valid);
        Ok(valid)
    }

    async fn check_status(&self, code: &str) -> Result<bool, AppError> {
        let key = status_key(code);
        let valid = match self.store.get(&key).await?.as_deref() {
            Some(USED_MARKER) => false,
            _ => matches!(self.store.ttl(&key).await?, Some(secs) if secs > 0),
        };
        Ok(valid)
    }

    /// Readiness of the underlying store.
    pub async fn ping(&self) -> Result<(), AppError> {
        self.store.ping().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::barcode::{BUFFER_SECS, CODE_LENGTH};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use tokio::time;

    fn service() -> (BarcodeService, MemoryStore) {
        let store = MemoryStore::new();
        let service = BarcodeService::new(Arc::new(store.clone()), CodeGenerator::seeded(99));
        (service, store)
    }

    /// Store whose every call fails, as if Redis were unreachable.
    struct DownStore;

    #[async_trait]
    impl TtlStore for DownStore {
        async fn set(&self, _: &str, _: &str, _: Option<u64>) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
        async fn get(&self, _: &str) -> anyhow::Result<Option<String>> {
            anyhow::bail!("connection refused")
        }
        async fn ttl(&self, _: &str) -> anyhow::Result<Option<i64>> {
            anyhow::bail!("connection refused")
        }
        async fn ping(&self) -> anyhow::Result<()> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_returns_issue_snapshot() {
        let (service, _) = service();
        let before = Utc::now();
        let barcode = service.generate("alice").await.unwrap();

        assert_eq!(barcode.user_id, "alice");
        assert_eq!(barcode.code.len(), CODE_LENGTH);
        assert!(barcode.code.bytes().all(|b| b.is_ascii_digit()));
        assert!(barcode.status);

        let physical = barcode.physical_expire_at.unwrap();
        assert_eq!(
            physical - barcode.logical_expire_at,
            Duration::seconds(BUFFER_SECS as i64)
        );
        assert!(barcode.logical_expire_at >= before + Duration::seconds(LOGICAL_TTL_SECS as i64));
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_accepts_empty_user_id() {
        let (service, _) = service();
        let barcode = service.generate("").await.unwrap();
        assert_eq!(barcode.code.len(), CODE_LENGTH);
        assert!(service.is_valid(&barcode.code).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_generate_writes_both_records_with_physical_ttl() {
        let (service, store) = service();
        let barcode = service.generate("alice").await.unwrap();

        let status = store.get(&status_key(&barcode.code)).await.unwrap();
        assert_eq!(status.as_deref(), Some(barcode.code.as_str()));
        assert_eq!(
            store.ttl(&status_key(&barcode.code)).await.unwrap(),
            Some(PHYSICAL_TTL_SECS as i64)
        );

        let json = store.get(&dto_key(&barcode.code)).await.unwrap().unwrap();
        let stored: Barcode = serde_json::from_str(&json).unwrap();
        assert!(stored.status);
        assert!(stored.physical_expire_at.is_some());
        assert_eq!(
            store.ttl(&dto_key(&barcode.code)).await.unwrap(),
            Some(PHYSICAL_TTL_SECS as i64)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_fresh_barcode() {
        let (service, _) = service();
        let issued = service.generate("alice").await.unwrap();

        let fetched = service.fetch(&issued.code).await.unwrap().unwrap();
        assert_eq!(fetched.user_id, "alice");
        assert_eq!(fetched.code, issued.code);
        assert!(fetched.status);
        assert_eq!(fetched.physical_expire_at, None);
        assert_eq!(
            fetched.logical_expire_at.timestamp_millis(),
            issued.logical_expire_at.timestamp_millis()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_unknown_code_is_none() {
        let (service, _) = service();
        assert!(service.fetch("000000000000000000000000").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_without_metadata_is_none() {
        let (service, store) = service();
        let code = "111111111111111111111111";
        store.set(&status_key(code), code, Some(420)).await.unwrap();

        assert!(service.fetch(code).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_with_corrupt_metadata_is_none() {
        let (service, store) = service();
        let code = "222222222222222222222222";
        store.set(&status_key(code), code, Some(420)).await.unwrap();
        store.set(&dto_key(code), "{not json", Some(420)).await.unwrap();

        assert!(service.fetch(code).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_redeem_invalidates_and_keeps_ttl() {
        let (service, store) = service();
        let barcode = service.generate("alice").await.unwrap();
        let key = status_key(&barcode.code);

        time::advance(std::time::Duration::from_secs(100)).await;
        service.redeem(&barcode.code).await.unwrap();

        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some(USED_MARKER));
        assert_eq!(store.ttl(&key).await.unwrap(), Some(320));
        assert!(!service.is_valid(&barcode.code).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_redeem_never_outlives_physical_expiry() {
        let (service, store) = service();
        let barcode = service.generate("alice").await.unwrap();
        let key = status_key(&barcode.code);

        // 600 ms left on the status record
        time::advance(std::time::Duration::from_millis(PHYSICAL_TTL_SECS * 1000 - 600)).await;
        service.redeem(&barcode.code).await.unwrap();
        assert_eq!(store.get(&key).await.unwrap().as_deref(), Some(USED_MARKER));

        time::advance(std::time::Duration::from_millis(700)).await;
        assert_eq!(store.get(&key).await.unwrap(), None);
        assert_eq!(store.get(&dto_key(&barcode.code)).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redeem_is_idempotent() {
        let (service, _) = service();
        let barcode = service.generate("alice").await.unwrap();

        for _ in 0..3 {
            service.redeem(&barcode.code).await.unwrap();
            assert!(!service.is_valid(&barcode.code).await.unwrap());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_redeem_leaves_metadata_untouched() {
        let (service, store) = service();
        let barcode = service.generate("alice").await.unwrap();
        let before = store.get(&dto_key(&barcode.code)).await.unwrap();

        service.redeem(&barcode.code).await.unwrap();

        assert_eq!(store.get(&dto_key(&barcode.code)).await.unwrap(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redeem_unknown_code_writes_permanent_marker() {
        let (service, store) = service();
        let code = "333333333333333333333333";

        service.redeem(code).await.unwrap();

        assert_eq!(store.get(&status_key(code)).await.unwrap().as_deref(), Some(USED_MARKER));
        assert_eq!(store.ttl(&status_key(code)).await.unwrap(), None);

        time::advance(std::time::Duration::from_secs(86_400)).await;
        assert_eq!(store.get(&status_key(code)).await.unwrap().as_deref(), Some(USED_MARKER));
        assert!(!service.is_valid(code).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_redeemed_barcode_fetches_with_false_status() {
        let (service, _) = service();
        let barcode = service.generate("alice").await.unwrap();

        service.redeem(&barcode.code).await.unwrap();

        let fetched = service.fetch(&barcode.code).await.unwrap().unwrap();
        assert!(!fetched.status);
        assert_eq!(fetched.physical_expire_at, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redeem_after_expiry_resurrects_marker_without_metadata() {
        let (service, store) = service();
        let barcode = service.generate("alice").await.unwrap();

        time::advance(std::time::Duration::from_secs(PHYSICAL_TTL_SECS + 1)).await;
        service.redeem(&barcode.code).await.unwrap();

        assert_eq!(store.ttl(&status_key(&barcode.code)).await.unwrap(), None);
        assert!(!service.is_valid(&barcode.code).await.unwrap());
        // status record exists again but the metadata record is gone
        assert!(service.fetch(&barcode.code).await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_valid_through_buffer_after_logical_expiry() {
        let (service, _) = service();
        let barcode = service.generate("alice").await.unwrap();

        // Past the logical window, inside the buffer: still reported valid.
        time::advance(std::time::Duration::from_secs(LOGICAL_TTL_SECS + 60)).await;
        assert!(service.is_valid(&barcode.code).await.unwrap());

        time::advance(std::time::Duration::from_secs(BUFFER_SECS)).await;
        assert!(!service.is_valid(&barcode.code).await.unwrap());
    }

    #[tokio::test]
    async fn test_store_failures_propagate() {
        let service = BarcodeService::new(Arc::new(DownStore), CodeGenerator::seeded(1));

        assert!(matches!(service.generate("alice").await, Err(AppError::Store(_))));
        assert!(matches!(service.fetch("x").await, Err(AppError::Store(_))));
        assert!(matches!(service.redeem("x").await, Err(AppError::Store(_))));
        assert!(matches!(service.is_valid("x").await, Err(AppError::Store(_))));
        assert!(matches!(service.ping().await, Err(AppError::Store(_))));
    }
}
