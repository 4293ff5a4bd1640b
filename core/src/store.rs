//! SQLite persistence layer for run outputs.
//!
//! RULE: Only store.rs talks to the database.
//! The engine never writes; callers hand finished tables to the store.

use rusqlite::{params, Connection};
use crate::{
    coalesce::NearestControls,
    config::MatchConfig,
    engine::MatchReport,
    error::ControlResult,
    output::IdentityRow,
};

pub struct ControlStore {
    conn: Connection,
}

impl ControlStore {
    /// Open (or create) the output database at `path`.
    pub fn open(path: &str) -> ControlResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ControlResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ControlResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_controls.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(
        &self,
        run_id:  &str,
        mode:    &str,
        config:  &MatchConfig,
        version: &str,
    ) -> ControlResult<()> {
        self.conn.execute(
            "INSERT INTO run (run_id, mode, config_json, version) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, mode, serde_json::to_string(config)?, version],
        )?;
        Ok(())
    }

    pub fn run_config(&self, run_id: &str) -> ControlResult<MatchConfig> {
        let json: String = self.conn.query_row(
            "SELECT config_json FROM run WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(serde_json::from_str(&json)?)
    }

    // ── Identity output ────────────────────────────────────────

    pub fn insert_identity_rows(&mut self, run_id: &str, rows: &[IdentityRow]) -> ControlResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO control_properties
                 (run_id, property_id, date_trans, purchase_controls_pid,
                  purchase_controls_date, sale_controls_pid, sale_controls_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in rows {
                stmt.execute(params![
                    run_id,
                    row.property_id,
                    row.date_trans.to_string(),
                    row.purchase_controls_pid,
                    row.purchase_controls_date.map(|d| d.to_string()),
                    row.sale_controls_pid,
                    row.sale_controls_date.map(|d| d.to_string()),
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    pub fn identity_row_count(&self, run_id: &str) -> ControlResult<i64> {
        let n = self.conn.query_row(
            "SELECT COUNT(*) FROM control_properties WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(n)
    }

    /// Sale-side control ids recorded for one treated unit.
    pub fn sale_controls_for(&self, run_id: &str, property_id: &str) -> ControlResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT sale_controls_pid FROM control_properties
             WHERE run_id = ?1 AND property_id = ?2 AND sale_controls_pid IS NOT NULL
             ORDER BY id ASC",
        )?;
        let ids = stmt
            .query_map(params![run_id, property_id], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    // ── Statistics output ──────────────────────────────────────

    pub fn insert_nearest_controls(
        &mut self,
        run_id: &str,
        tag:    &str,
        rows:   &[NearestControls],
    ) -> ControlResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO nearest_controls
                 (run_id, tag, property_id, date_trans, idx, l_idx, d_idx,
                  radius, duration_idx, l_duration_idx)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            )?;
            for row in rows {
                stmt.execute(params![
                    run_id,
                    tag,
                    row.property_id,
                    row.date_trans.to_string(),
                    row.index,
                    row.l_index,
                    row.d_index,
                    row.radius,
                    row.duration_idx,
                    row.l_duration_idx,
                ])?;
            }
        }
        tx.commit()?;
        Ok(rows.len())
    }

    /// `(index, L_index, radius)` for one treated unit under one tag.
    pub fn nearest_for(
        &self,
        run_id:      &str,
        tag:         &str,
        property_id: &str,
    ) -> ControlResult<Option<(Option<f64>, Option<f64>, Option<f64>)>> {
        let mut stmt = self.conn.prepare(
            "SELECT idx, l_idx, radius FROM nearest_controls
             WHERE run_id = ?1 AND tag = ?2 AND property_id = ?3
             ORDER BY id ASC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![run_id, tag, property_id])?;
        let found = match rows.next()? {
            Some(row) => Some((row.get(0)?, row.get(1)?, row.get(2)?)),
            None => None,
        };
        Ok(found)
    }

    // ── Diagnostics ────────────────────────────────────────────

    pub fn insert_report(&self, run_id: &str, tag: &str, report: &MatchReport) -> ControlResult<()> {
        self.conn.execute(
            "INSERT INTO match_report
             (run_id, tag, chunks_submitted, chunks_dropped, units_dropped,
              units_processed, units_unmatched)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                tag,
                report.chunks_submitted as i64,
                report.chunks_dropped as i64,
                report.units_dropped as i64,
                report.units_processed as i64,
                report.units_unmatched as i64,
            ],
        )?;
        Ok(())
    }

    pub fn report(&self, run_id: &str, tag: &str) -> ControlResult<Option<MatchReport>> {
        let mut stmt = self.conn.prepare(
            "SELECT chunks_submitted, chunks_dropped, units_dropped, units_processed, units_unmatched
             FROM match_report WHERE run_id = ?1 AND tag = ?2",
        )?;
        let mut rows = stmt.query(params![run_id, tag])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        Ok(Some(MatchReport {
            chunks_submitted: row.get::<_, i64>(0)? as usize,
            chunks_dropped:   row.get::<_, i64>(1)? as usize,
            units_dropped:    row.get::<_, i64>(2)? as usize,
            units_processed:  row.get::<_, i64>(3)? as usize,
            units_unmatched:  row.get::<_, i64>(4)? as usize,
        }))
    }
}
