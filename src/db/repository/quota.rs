use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;

/// Atomically create-or-increment a quota bucket and return the new count.
///
/// Single statement: SQLite holds the write lock for the whole upsert, so
/// concurrent callers on the same key serialize and never lose an increment.
pub fn increment_bucket(
    conn: &Connection,
    fingerprint: &str,
    window_secs: u64,
    bucket_index: i64,
    expires_at: i64,
) -> Result<u32, DatabaseError> {
    let count: i64 = conn.query_row(
        "INSERT INTO quota_buckets (fingerprint, window_secs, bucket_index, count, expires_at)
         VALUES (?1, ?2, ?3, 1, ?4)
         ON CONFLICT(fingerprint, window_secs, bucket_index) DO UPDATE SET
           count = count + 1
         RETURNING count",
        params![fingerprint, window_secs as i64, bucket_index, expires_at],
        |row| row.get(0),
    )?;
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

/// Current count of a bucket, if it exists.
pub fn get_bucket_count(
    conn: &Connection,
    fingerprint: &str,
    window_secs: u64,
    bucket_index: i64,
) -> Result<Option<u32>, DatabaseError> {
    let count: Option<i64> = conn
        .query_row(
            "SELECT count FROM quota_buckets
             WHERE fingerprint = ?1 AND window_secs = ?2 AND bucket_index = ?3",
            params![fingerprint, window_secs as i64, bucket_index],
            |row| row.get(0),
        )
        .optional()?;
    Ok(count.map(|c| u32::try_from(c).unwrap_or(u32::MAX)))
}

/// Delete buckets whose window has closed. Returns rows removed.
pub fn delete_expired_buckets(conn: &Connection, now: i64) -> Result<u64, DatabaseError> {
    let affected = conn.execute(
        "DELETE FROM quota_buckets WHERE expires_at <= ?1",
        params![now],
    )?;
    Ok(affected as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;

    fn test_db() -> Connection {
        open_memory_database().unwrap()
    }

    #[test]
    fn first_increment_creates_row_with_one() {
        let conn = test_db();
        let count = increment_bucket(&conn, "fp-a", 60, 100, 6060).unwrap();
        assert_eq!(count, 1);
        assert_eq!(get_bucket_count(&conn, "fp-a", 60, 100).unwrap(), Some(1));
    }

    #[test]
    fn repeated_increments_accumulate() {
        let conn = test_db();
        for expected in 1..=5 {
            let count = increment_bucket(&conn, "fp-a", 60, 100, 6060).unwrap();
            assert_eq!(count, expected);
        }
    }

    #[test]
    fn keys_are_isolated() {
        let conn = test_db();
        increment_bucket(&conn, "fp-a", 60, 100, 6060).unwrap();
        increment_bucket(&conn, "fp-a", 60, 100, 6060).unwrap();

        assert_eq!(increment_bucket(&conn, "fp-b", 60, 100, 6060).unwrap(), 1);
        assert_eq!(increment_bucket(&conn, "fp-a", 3600, 1, 7200).unwrap(), 1);
        assert_eq!(increment_bucket(&conn, "fp-a", 60, 101, 6120).unwrap(), 1);
    }

    #[test]
    fn missing_bucket_reads_none() {
        let conn = test_db();
        assert_eq!(get_bucket_count(&conn, "nobody", 60, 1).unwrap(), None);
    }

    #[test]
    fn sweep_removes_only_expired() {
        let conn = test_db();
        increment_bucket(&conn, "fp-old", 60, 1, 120).unwrap();
        increment_bucket(&conn, "fp-new", 60, 10, 660).unwrap();

        let removed = delete_expired_buckets(&conn, 500).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(get_bucket_count(&conn, "fp-old", 60, 1).unwrap(), None);
        assert_eq!(get_bucket_count(&conn, "fp-new", 60, 10).unwrap(), Some(1));
    }

    #[test]
    fn increment_without_schema_is_an_error() {
        let conn = Connection::open_in_memory().unwrap();
        let result = increment_bucket(&conn, "fp-a", 60, 1, 120);
        assert!(matches!(result, Err(DatabaseError::Sqlite(_))));
    }
}
