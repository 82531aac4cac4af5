use std::thread::JoinHandle;

use uuid::Uuid;

use crate::db::{
    get_global_followup, get_local_followup, increment_global_usage, upsert_global_followup,
    upsert_local_followup, Database, DatabaseError,
};
use crate::models::{FollowUpItem, FollowUpKind};

/// Two-tier follow-up cache over SQLite.
///
/// Tier one is keyed by report and kind, tier two by signature. Every call
/// opens its own connection.
#[derive(Debug, Clone)]
pub struct TwoTierCache {
    db: Database,
}

impl TwoTierCache {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn lookup_local(
        &self,
        report_id: &Uuid,
        kind: FollowUpKind,
    ) -> Result<Option<Vec<FollowUpItem>>, DatabaseError> {
        let conn = self.db.open()?;
        get_local_followup(&conn, report_id, kind)
    }

    pub fn store_local(
        &self,
        report_id: &Uuid,
        kind: FollowUpKind,
        items: &[FollowUpItem],
    ) -> Result<(), DatabaseError> {
        let conn = self.db.open()?;
        upsert_local_followup(&conn, report_id, kind, items)
    }

    pub fn lookup(&self, signature: &str) -> Result<Option<Vec<FollowUpItem>>, DatabaseError> {
        let conn = self.db.open()?;
        Ok(get_global_followup(&conn, signature)?.map(|entry| entry.payload))
    }

    pub fn store(&self, signature: &str, items: &[FollowUpItem]) -> Result<(), DatabaseError> {
        let conn = self.db.open()?;
        upsert_global_followup(&conn, signature, items)
    }

    /// Bump the usage counter of a global entry on a detached thread.
    ///
    /// Failures are logged and never reach the caller. The handle is only
    /// useful to tests; dropping it detaches the thread.
    pub fn record_hit(&self, signature: &str) -> Option<JoinHandle<()>> {
        let db = self.db.clone();
        let key = signature.to_string();
        let spawned = std::thread::Builder::new()
            .name("followup-usage".into())
            .spawn(move || {
                let result = db.open().and_then(|conn| increment_global_usage(&conn, &key));
                if let Err(e) = result {
                    tracing::warn!(error = %e, signature = %key, "Usage counter update failed");
                }
            });
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Could not spawn usage counter thread");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::insert_lab_report;
    use crate::db::repository::lab_report::tests::report_for;

    fn cache() -> (tempfile::TempDir, TwoTierCache) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::initialize(&dir.path().join("labscore.db")).unwrap();
        (dir, TwoTierCache::new(db))
    }

    #[test]
    fn global_round_trip() {
        let (_dir, cache) = cache();
        assert!(cache.lookup("questions_ldl:warning").unwrap().is_none());

        cache
            .store("questions_ldl:warning", &[FollowUpItem::new("Q")])
            .unwrap();
        assert_eq!(
            cache.lookup("questions_ldl:warning").unwrap().unwrap(),
            vec![FollowUpItem::new("Q")]
        );
    }

    #[test]
    fn local_round_trip() {
        let (_dir, cache) = cache();
        let report = report_for("user-1", vec![]);
        insert_lab_report(&cache.db.open().unwrap(), &report).unwrap();

        cache
            .store_local(&report.id, FollowUpKind::ClinicalInsights, &[FollowUpItem::new("I")])
            .unwrap();
        assert!(cache
            .lookup_local(&report.id, FollowUpKind::DoctorQuestions)
            .unwrap()
            .is_none());
        assert_eq!(
            cache
                .lookup_local(&report.id, FollowUpKind::ClinicalInsights)
                .unwrap()
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn record_hit_bumps_usage() {
        let (_dir, cache) = cache();
        cache.store("insights_tsh:critical", &[FollowUpItem::new("I")]).unwrap();

        cache.record_hit("insights_tsh:critical").unwrap().join().unwrap();
        cache.record_hit("insights_tsh:critical").unwrap().join().unwrap();

        let conn = cache.db.open().unwrap();
        let entry = get_global_followup(&conn, "insights_tsh:critical")
            .unwrap()
            .unwrap();
        assert_eq!(entry.usage_count, 2);
    }

    #[test]
    fn record_hit_failure_is_swallowed() {
        let (_dir, cache) = cache();
        cache
            .db
            .open()
            .unwrap()
            .execute("DROP TABLE global_followup_cache", [])
            .unwrap();
        // Thread logs and exits cleanly.
        cache.record_hit("questions_x:warning").unwrap().join().unwrap();
    }
}
