use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::*;

pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Insert a report and its biomarkers in one transaction.
pub fn insert_lab_report(conn: &Connection, report: &LabReport) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "INSERT INTO lab_reports (id, user_id, created_at, health_score, risk_level, summary, symptoms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            report.id.to_string(),
            report.user_id,
            report.created_at.format(TIMESTAMP_FORMAT).to_string(),
            report.health_score,
            report.risk_level.as_str(),
            report.summary,
            report.symptoms,
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO biomarkers (id, report_id, position, name, value, unit,
             reference_min, reference_max, status, category, confidence, interpretation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )?;
        for (position, b) in report.biomarkers.iter().enumerate() {
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                report.id.to_string(),
                position as i64,
                b.name,
                b.value,
                b.unit,
                b.reference_min,
                b.reference_max,
                b.status.as_str(),
                b.category,
                b.confidence as f64,
                b.interpretation,
            ])?;
        }
    }

    tx.commit()?;
    Ok(())
}

/// Most recent report for a user, biomarkers included.
pub fn get_latest_report(
    conn: &Connection,
    user_id: &str,
) -> Result<Option<LabReport>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, user_id, created_at, health_score, risk_level, summary, symptoms
             FROM lab_reports WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC
             LIMIT 1",
            params![user_id],
            report_row_from_rusqlite,
        )
        .optional()?;

    match row {
        Some(row) => Ok(Some(report_from_row(conn, row)?)),
        None => Ok(None),
    }
}

/// Biomarkers of a report in extraction order.
pub fn get_report_biomarkers(
    conn: &Connection,
    report_id: &Uuid,
) -> Result<Vec<Biomarker>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT name, value, unit, reference_min, reference_max, status, category,
                confidence, interpretation
         FROM biomarkers WHERE report_id = ?1 ORDER BY position",
    )?;

    let rows = stmt.query_map(params![report_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<f64>>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<f64>>(3)?,
            row.get::<_, Option<f64>>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, f64>(7)?,
            row.get::<_, String>(8)?,
        ))
    })?;

    let mut biomarkers = Vec::new();
    for row in rows {
        let (name, value, unit, reference_min, reference_max, status, category, confidence, interpretation) =
            row?;
        biomarkers.push(Biomarker {
            name,
            value,
            unit,
            reference_min,
            reference_max,
            status: BiomarkerStatus::from_str(&status)?,
            category,
            confidence: confidence as f32,
            interpretation,
        });
    }
    Ok(biomarkers)
}

struct ReportRow {
    id: String,
    user_id: String,
    created_at: String,
    health_score: f64,
    risk_level: String,
    summary: String,
    symptoms: String,
}

fn report_row_from_rusqlite(row: &rusqlite::Row) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        created_at: row.get(2)?,
        health_score: row.get(3)?,
        risk_level: row.get(4)?,
        summary: row.get(5)?,
        symptoms: row.get(6)?,
    })
}

/// Parse a stored `TIMESTAMP_FORMAT` column; a malformed value is an error.
pub(crate) fn parse_timestamp(field: &str, raw: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|_| DatabaseError::InvalidEnum {
        field: field.into(),
        value: raw.to_string(),
    })
}

fn report_from_row(conn: &Connection, row: ReportRow) -> Result<LabReport, DatabaseError> {
    let id = Uuid::parse_str(&row.id).map_err(|_| DatabaseError::InvalidEnum {
        field: "lab_reports.id".into(),
        value: row.id.clone(),
    })?;
    let biomarkers = get_report_biomarkers(conn, &id)?;
    Ok(LabReport {
        id,
        user_id: row.user_id,
        created_at: parse_timestamp("lab_reports.created_at", &row.created_at)?,
        health_score: row.health_score,
        risk_level: RiskLevel::from_str(&row.risk_level)?,
        summary: row.summary,
        symptoms: row.symptoms,
        biomarkers,
    })
}
