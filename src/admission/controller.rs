use serde::Serialize;

use super::fingerprint::Fingerprint;
use crate::config::{WindowConfig, FAIL_CLOSED_RETRY_AFTER_SECS};
use crate::db::{self, Database, DatabaseError};

/// Identity of one quota bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketKey<'a> {
    pub fingerprint: &'a str,
    pub window_secs: u64,
    pub bucket_index: i64,
}

impl BucketKey<'_> {
    /// Unix second at which this bucket's window closes.
    pub fn expires_at(&self) -> i64 {
        (self.bucket_index + 1).saturating_mul(self.window_secs as i64)
    }
}

/// Durable counter backing the admission controller.
///
/// `increment` must be a single atomic insert-or-increment that returns the
/// post-increment count; implementations never read-then-write.
pub trait QuotaStore: Send + Sync {
    fn increment(&self, key: &BucketKey<'_>) -> Result<u32, DatabaseError>;
}

/// SQLite-backed quota store. Opens a fresh connection per call.
#[derive(Debug, Clone)]
pub struct SqliteQuotaStore {
    db: Database,
}

impl SqliteQuotaStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Remove buckets whose window closed at or before `now`.
    pub fn sweep_expired(&self, now: i64) -> Result<u64, DatabaseError> {
        let conn = self.db.open()?;
        let removed = db::delete_expired_buckets(&conn, now)?;
        tracing::info!(removed, "Swept expired quota buckets");
        Ok(removed)
    }
}

impl QuotaStore for SqliteQuotaStore {
    fn increment(&self, key: &BucketKey<'_>) -> Result<u32, DatabaseError> {
        let conn = self.db.open()?;
        db::increment_bucket(
            &conn,
            key.fingerprint,
            key.window_secs,
            key.bucket_index,
            key.expires_at(),
        )
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub allowed: bool,
    pub retry_after_secs: u64,
}

impl Decision {
    pub const ALLOW: Decision = Decision {
        allowed: true,
        retry_after_secs: 0,
    };

    pub fn deny(retry_after_secs: u64) -> Self {
        Self {
            allowed: false,
            retry_after_secs,
        }
    }
}

/// Cascading fixed-window rate limiter over a [`QuotaStore`].
///
/// Windows are evaluated in order, each as its own atomic increment. A
/// request denied by a later window has already spent one unit of every
/// earlier window.
pub struct AdmissionController<S> {
    store: S,
    windows: Vec<WindowConfig>,
}

impl<S: QuotaStore> AdmissionController<S> {
    pub fn new(store: S, windows: impl Into<Vec<WindowConfig>>) -> Self {
        Self {
            store,
            windows: windows.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Count one request against a single window.
    pub fn allow(&self, fingerprint: &Fingerprint, window: WindowConfig) -> Decision {
        self.allow_at(fingerprint, window, chrono::Utc::now().timestamp())
    }

    pub fn allow_at(&self, fingerprint: &Fingerprint, window: WindowConfig, now: i64) -> Decision {
        if window.window_secs == 0 {
            tracing::error!("Admission window of zero seconds; denying");
            return Decision::deny(FAIL_CLOSED_RETRY_AFTER_SECS);
        }

        let key = BucketKey {
            fingerprint: fingerprint.as_str(),
            window_secs: window.window_secs,
            bucket_index: now.div_euclid(window.window_secs as i64),
        };

        match self.store.increment(&key) {
            Ok(count) if count <= window.limit => Decision::ALLOW,
            Ok(count) => {
                tracing::info!(
                    fingerprint = %fingerprint,
                    window_secs = window.window_secs,
                    limit = window.limit,
                    count,
                    "Admission denied: quota exhausted"
                );
                Decision::deny(window.window_secs)
            }
            Err(e) => {
                tracing::warn!(
                    fingerprint = %fingerprint,
                    window_secs = window.window_secs,
                    error = %e,
                    "Quota store unavailable; failing closed"
                );
                Decision::deny(FAIL_CLOSED_RETRY_AFTER_SECS)
            }
        }
    }

    /// Evaluate every configured window, shortest first.
    pub fn check_rate_limit(&self, fingerprint: &Fingerprint) -> Decision {
        self.check_rate_limit_at(fingerprint, chrono::Utc::now().timestamp())
    }

    pub fn check_rate_limit_at(&self, fingerprint: &Fingerprint, now: i64) -> Decision {
        for window in &self.windows {
            let decision = self.allow_at(fingerprint, *window, now);
            if !decision.allowed {
                return decision;
            }
        }
        Decision::ALLOW
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct BrokenStore;

    impl QuotaStore for BrokenStore {
        fn increment(&self, _key: &BucketKey<'_>) -> Result<u32, DatabaseError> {
            Err(DatabaseError::Sqlite(rusqlite::Error::InvalidQuery))
        }
    }

    const SHORT: WindowConfig = WindowConfig {
        window_secs: 60,
        limit: 10,
    };
    const LONG: WindowConfig = WindowConfig {
        window_secs: 3600,
        limit: 100,
    };
    /// 2026-01-01T00:00:00Z, aligned to both windows.
    const T0: i64 = 1_767_225_600;

    fn sqlite_controller(
        windows: &[WindowConfig],
    ) -> (AdmissionController<SqliteQuotaStore>, Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::initialize(&dir.path().join("quota.db")).unwrap();
        let controller = AdmissionController::new(SqliteQuotaStore::new(db.clone()), windows.to_vec());
        (controller, db, dir)
    }

    fn fp(raw: &str) -> Fingerprint {
        Fingerprint::derive("test", raw)
    }

    #[test]
    fn nth_call_allowed_next_denied() {
        let (controller, _db, _dir) = sqlite_controller(&[]);
        let window = WindowConfig {
            window_secs: 60,
            limit: 3,
        };
        let caller = fp("198.51.100.1");

        for _ in 0..3 {
            assert!(controller.allow_at(&caller, window, T0).allowed);
        }
        let denied = controller.allow_at(&caller, window, T0 + 59);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after_secs, 60);
    }

    #[test]
    fn new_bucket_resets_quota() {
        let (controller, _db, _dir) = sqlite_controller(&[]);
        let window = WindowConfig {
            window_secs: 60,
            limit: 1,
        };
        let caller = fp("198.51.100.1");

        assert!(controller.allow_at(&caller, window, T0).allowed);
        assert!(!controller.allow_at(&caller, window, T0 + 30).allowed);
        assert!(controller.allow_at(&caller, window, T0 + 60).allowed);
    }

    #[test]
    fn fingerprints_do_not_share_quota() {
        let (controller, _db, _dir) = sqlite_controller(&[]);
        let window = WindowConfig {
            window_secs: 60,
            limit: 1,
        };
        assert!(controller.allow_at(&fp("a"), window, T0).allowed);
        assert!(controller.allow_at(&fp("b"), window, T0).allowed);
        assert!(!controller.allow_at(&fp("a"), window, T0).allowed);
    }

    #[test]
    fn store_error_fails_closed() {
        let controller = AdmissionController::new(BrokenStore, vec![SHORT, LONG]);
        let decision = controller.check_rate_limit(&fp("198.51.100.1"));
        assert!(!decision.allowed);
        assert_eq!(decision.retry_after_secs, FAIL_CLOSED_RETRY_AFTER_SECS);
    }

    #[test]
    fn missing_schema_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::initialize(&dir.path().join("broken.db")).unwrap();
        db.open()
            .unwrap()
            .execute_batch("DROP TABLE quota_buckets;")
            .unwrap();

        let controller = AdmissionController::new(SqliteQuotaStore::new(db), vec![SHORT]);
        let decision = controller.check_rate_limit_at(&fp("x"), T0);
        assert!(!decision.allowed);
        assert!(decision.retry_after_secs > 0);
    }

    #[test]
    fn short_window_checked_first() {
        let short = WindowConfig {
            window_secs: 60,
            limit: 1,
        };
        let (controller, db, _dir) = sqlite_controller(&[short, LONG]);
        let caller = fp("198.51.100.1");

        assert!(controller.check_rate_limit_at(&caller, T0).allowed);
        let denied = controller.check_rate_limit_at(&caller, T0);
        assert_eq!(denied, Decision::deny(60));

        // The long window was never touched by the denied call.
        let conn = db.open().unwrap();
        let long_bucket = T0.div_euclid(3600);
        assert_eq!(
            db::get_bucket_count(&conn, caller.as_str(), 3600, long_bucket).unwrap(),
            Some(1)
        );
    }

    #[test]
    fn long_window_denial_still_spends_short_quota() {
        let short = WindowConfig {
            window_secs: 60,
            limit: 5,
        };
        let long = WindowConfig {
            window_secs: 3600,
            limit: 2,
        };
        let (controller, db, _dir) = sqlite_controller(&[short, long]);
        let caller = fp("198.51.100.1");

        assert!(controller.check_rate_limit_at(&caller, T0).allowed);
        assert!(controller.check_rate_limit_at(&caller, T0).allowed);

        let denied = controller.check_rate_limit_at(&caller, T0);
        assert_eq!(denied, Decision::deny(3600));

        // Documented undercount-on-deny: the denied request consumed a short unit.
        let conn = db.open().unwrap();
        let short_bucket = T0.div_euclid(60);
        assert_eq!(
            db::get_bucket_count(&conn, caller.as_str(), 60, short_bucket).unwrap(),
            Some(3)
        );
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let (controller, db, _dir) = sqlite_controller(&[]);
        let controller = Arc::new(controller);
        let window = WindowConfig {
            window_secs: 60,
            limit: 120,
        };
        let caller = fp("198.51.100.1");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let controller = Arc::clone(&controller);
                let caller = caller.clone();
                std::thread::spawn(move || {
                    (0..20)
                        .filter(|_| controller.allow_at(&caller, window, T0).allowed)
                        .count()
                })
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 120);

        let conn = db.open().unwrap();
        assert_eq!(
            db::get_bucket_count(&conn, caller.as_str(), 60, T0.div_euclid(60)).unwrap(),
            Some(160)
        );
    }

    #[test]
    fn bucket_expiry_is_window_end() {
        let key = BucketKey {
            fingerprint: "fp",
            window_secs: 60,
            bucket_index: T0 / 60,
        };
        assert_eq!(key.expires_at(), T0 + 60);
    }

    #[test]
    fn sweep_clears_closed_windows() {
        let (controller, db, _dir) = sqlite_controller(&[SHORT]);
        controller.check_rate_limit_at(&fp("a"), T0);

        let removed = controller.store().sweep_expired(T0 + 61).unwrap();
        assert_eq!(removed, 1);
        let conn = db.open().unwrap();
        assert_eq!(
            db::get_bucket_count(&conn, fp("a").as_str(), 60, T0 / 60).unwrap(),
            None
        );
    }
}
