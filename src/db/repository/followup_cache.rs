use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::lab_report::{parse_timestamp, TIMESTAMP_FORMAT};
use crate::db::DatabaseError;
use crate::models::{CacheEntry, FollowUpItem, FollowUpKind};

fn encode_payload(items: &[FollowUpItem]) -> Result<String, DatabaseError> {
    serde_json::to_string(items).map_err(|e| DatabaseError::CorruptPayload(e.to_string()))
}

fn decode_payload(raw: &str) -> Result<Vec<FollowUpItem>, DatabaseError> {
    serde_json::from_str(raw).map_err(|e| DatabaseError::CorruptPayload(e.to_string()))
}

fn now_string() -> String {
    chrono::Utc::now()
        .naive_utc()
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

// ═══════════════════════════════════════════
// Tier 1: per-report
// ═══════════════════════════════════════════

pub fn get_local_followup(
    conn: &Connection,
    report_id: &Uuid,
    kind: FollowUpKind,
) -> Result<Option<Vec<FollowUpItem>>, DatabaseError> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT payload FROM local_followup_cache WHERE report_id = ?1 AND kind = ?2",
            params![report_id.to_string(), kind.as_str()],
            |row| row.get(0),
        )
        .optional()?;
    raw.as_deref().map(decode_payload).transpose()
}

pub fn upsert_local_followup(
    conn: &Connection,
    report_id: &Uuid,
    kind: FollowUpKind,
    items: &[FollowUpItem],
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO local_followup_cache (report_id, kind, payload, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(report_id, kind) DO UPDATE SET
           payload = excluded.payload,
           updated_at = excluded.updated_at",
        params![
            report_id.to_string(),
            kind.as_str(),
            encode_payload(items)?,
            now_string(),
        ],
    )?;
    Ok(())
}

// ═══════════════════════════════════════════
// Tier 2: cross-user, signature-keyed
// ═══════════════════════════════════════════

pub fn get_global_followup(
    conn: &Connection,
    key: &str,
) -> Result<Option<CacheEntry>, DatabaseError> {
    let row: Option<(String, i64, String)> = conn
        .query_row(
            "SELECT payload, usage_count, updated_at FROM global_followup_cache
             WHERE cache_key = ?1",
            params![key],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    match row {
        Some((payload, usage_count, updated_at)) => Ok(Some(CacheEntry {
            key: key.to_string(),
            payload: decode_payload(&payload)?,
            usage_count,
            updated_at: parse_timestamp("global_followup_cache.updated_at", &updated_at)?,
        })),
        None => Ok(None),
    }
}

/// Last write wins on the payload; the usage counter survives overwrites.
pub fn upsert_global_followup(
    conn: &Connection,
    key: &str,
    items: &[FollowUpItem],
) -> Result<(), DatabaseError> {
    let now = now_string();
    conn.execute(
        "INSERT INTO global_followup_cache (cache_key, payload, usage_count, created_at, updated_at)
         VALUES (?1, ?2, 0, ?3, ?3)
         ON CONFLICT(cache_key) DO UPDATE SET
           payload = excluded.payload,
           updated_at = excluded.updated_at",
        params![key, encode_payload(items)?, now],
    )?;
    Ok(())
}

/// Bump the popularity counter of a global entry. Returns rows touched.
pub fn increment_global_usage(conn: &Connection, key: &str) -> Result<u64, DatabaseError> {
    let affected = conn.execute(
        "UPDATE global_followup_cache SET usage_count = usage_count + 1 WHERE cache_key = ?1",
        params![key],
    )?;
    Ok(affected as u64)
}
