//! Maintenance of `Apiary::total_hives`.
//!
//! The count is only ever changed by the backend's atomic increment/decrement,
//! invoked once per committed hive create, delete, or cross-apiary move. The
//! client never computes it. When one of those calls fails, the apiary is
//! recounted server-side on the next refresh.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use nyuki_core::entities::{Apiary, Hive, NewHive};
use nyuki_core::errors::BackendError;
use nyuki_core::ids::is_correlation_id;
use nyuki_core::updates::hive::HivePatch;

use crate::backend::CounterBackend;
use crate::error::{CounterDriftWarning, CounterOp, WriteError};
use crate::hooks::{Committed, WriteHook};
use crate::store::EntityStore;

const DRIFT_LOG_CAPACITY: usize = 32;

pub struct CounterMaintainer {
    counters: Arc<dyn CounterBackend>,
    apiaries: EntityStore<Apiary>,
    request_timeout: Duration,
    drift: Mutex<VecDeque<CounterDriftWarning>>,
    /// `(owner_id, apiary_id)` pairs whose count needs a recount.
    repairs: Mutex<BTreeSet<(String, String)>>,
}

impl CounterMaintainer {
    #[must_use]
    pub fn new(
        counters: Arc<dyn CounterBackend>,
        apiaries: EntityStore<Apiary>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            counters,
            apiaries,
            request_timeout,
            drift: Mutex::new(VecDeque::new()),
            repairs: Mutex::new(BTreeSet::new()),
        }
    }

    /// Counter failures seen recently, oldest first.
    #[must_use]
    pub fn drift_warnings(&self) -> Vec<CounterDriftWarning> {
        self.drift
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Apiaries of `owner_id` still waiting for a recount.
    #[must_use]
    pub fn pending_repairs(&self, owner_id: &str) -> Vec<String> {
        self.repairs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(owner, _)| owner == owner_id)
            .map(|(_, apiary_id)| apiary_id.clone())
            .collect()
    }

    /// Recount every apiary of `owner_id` whose counter call failed.
    ///
    /// A successful recount replaces the cached apiary and clears its stale
    /// flag. A failed one leaves the apiary stale and queued for next time.
    pub async fn repair(&self, owner_id: &str) {
        let queued: Vec<(String, String)> = {
            let mut repairs = self.repairs.lock().unwrap_or_else(PoisonError::into_inner);
            let queued = repairs
                .iter()
                .filter(|(owner, _)| owner == owner_id)
                .cloned()
                .collect::<Vec<_>>();
            for key in &queued {
                repairs.remove(key);
            }
            queued
        };

        for key in queued {
            let apiary_id = key.1.as_str();
            let call = self.counters.recount_hives(owner_id, apiary_id);
            match tokio::time::timeout(self.request_timeout, call).await {
                Ok(Ok(apiary)) => {
                    tracing::info!(
                        apiary_id,
                        total_hives = apiary.total_hives,
                        "hive count recounted"
                    );
                    let _ = self.apiaries.apply_authoritative(apiary);
                    if !self.needs_repair(&key) {
                        self.apiaries.clear_stale(apiary_id);
                    }
                }
                Ok(Err(BackendError::NotFound { .. })) => {
                    tracing::debug!(apiary_id, "apiary gone before its recount");
                    self.apiaries.clear_stale(apiary_id);
                }
                Ok(Err(error)) => {
                    tracing::warn!(apiary_id, %error, "hive recount failed; apiary stays stale");
                    self.queue_repair(key);
                }
                Err(_) => {
                    tracing::warn!(apiary_id, "hive recount timed out; apiary stays stale");
                    self.queue_repair(key);
                }
            }
        }
    }

    fn needs_repair(&self, key: &(String, String)) -> bool {
        self.repairs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    fn queue_repair(&self, key: (String, String)) {
        self.apiaries.mark_stale(&key.1);
        self.repairs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key);
    }

    fn require_apiary(&self, apiary_id: &str) -> Result<(), WriteError> {
        if is_correlation_id(apiary_id) || self.apiaries.get(apiary_id).is_none() {
            return Err(WriteError::InvalidReference {
                field: "apiary_id",
                id: apiary_id.to_string(),
            });
        }
        Ok(())
    }

    async fn adjust(&self, owner_id: &str, apiary_id: &str, operation: CounterOp) {
        let call = async {
            match operation {
                CounterOp::Increment => {
                    self.counters
                        .increment_hive_count(owner_id, apiary_id)
                        .await
                }
                CounterOp::Decrement => {
                    self.counters
                        .decrement_hive_count(owner_id, apiary_id)
                        .await
                }
            }
        };
        let reason = match tokio::time::timeout(self.request_timeout, call).await {
            Ok(Ok(apiary)) => {
                tracing::debug!(
                    apiary_id,
                    %operation,
                    total_hives = apiary.total_hives,
                    "hive count adjusted"
                );
                // A pushed event may already have delivered this version.
                let _ = self.apiaries.apply_authoritative(apiary);
                return;
            }
            Ok(Err(error)) => error.to_string(),
            Err(_) => "timed out".to_string(),
        };

        let warning = CounterDriftWarning {
            apiary_id: apiary_id.to_string(),
            operation,
            reason,
        };
        tracing::warn!(%warning, "hive counter RPC failed; apiary marked stale");
        self.queue_repair((owner_id.to_string(), apiary_id.to_string()));

        let mut drift = self.drift.lock().unwrap_or_else(PoisonError::into_inner);
        if drift.len() == DRIFT_LOG_CAPACITY {
            drift.pop_front();
        }
        drift.push_back(warning);
    }
}

#[async_trait]
impl WriteHook<Hive> for CounterMaintainer {
    fn check_create(&self, draft: &NewHive) -> Result<(), WriteError> {
        self.require_apiary(&draft.apiary_id)
    }

    fn check_update(&self, current: &Hive, patch: &HivePatch) -> Result<(), WriteError> {
        match &patch.apiary_id {
            Some(target) if *target != current.apiary_id => self.require_apiary(target),
            _ => Ok(()),
        }
    }

    async fn after_commit(&self, committed: &Committed<Hive>) {
        match committed {
            Committed::Created(hive) => {
                self.adjust(&hive.user_id, &hive.apiary_id, CounterOp::Increment)
                    .await;
            }
            Committed::Deleted(hive) => {
                self.adjust(&hive.user_id, &hive.apiary_id, CounterOp::Decrement)
                    .await;
            }
            Committed::Updated { before, after } if before.apiary_id != after.apiary_id => {
                self.adjust(&before.user_id, &before.apiary_id, CounterOp::Decrement)
                    .await;
                self.adjust(&after.user_id, &after.apiary_id, CounterOp::Increment)
                    .await;
            }
            Committed::Updated { .. } => {}
        }
    }
}
