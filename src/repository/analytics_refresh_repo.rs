use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::{Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

pub(crate) const REFRESH_LOG_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS analytics_refresh_log (
      refresh_id TEXT PRIMARY KEY,
      project_id TEXT,
      trigger_type TEXT NOT NULL,
      trigger_source TEXT,
      rows_affected INTEGER NOT NULL DEFAULT 0,
      started_at TEXT NOT NULL DEFAULT (datetime('now')),
      completed_at TEXT,
      duration_ms INTEGER,
      status TEXT NOT NULL DEFAULT 'RUNNING',
      error_message TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_analytics_refresh_log_project
      ON analytics_refresh_log(project_id, started_at DESC);
"#;

/// 刷新日志默认保留天数
pub const DEFAULT_LOG_RETENTION_DAYS: i64 = 30;
pub const MAX_LOG_RETENTION_DAYS: i64 = 365;

/// 删除早于保留期的日志（RUNNING 不删）
///
/// started_at 为 RFC3339 UTC，截止时间用同一格式按字符串比较
pub(crate) fn delete_logs_older_than(conn: &Connection, keep_days: i64) -> rusqlite::Result<usize> {
    let days = if keep_days <= 0 {
        DEFAULT_LOG_RETENTION_DAYS
    } else {
        keep_days.min(MAX_LOG_RETENTION_DAYS)
    };
    let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();
    conn.execute(
        r#"
        DELETE FROM analytics_refresh_log
        WHERE started_at < ?1
          AND status <> 'RUNNING'
        "#,
        params![cutoff],
    )
}

/// 删除同项目、同触发类型下被新记录取代的成功日志
pub(crate) fn delete_superseded_logs(
    conn: &Connection,
    project_id: &str,
    trigger_type: &str,
    keep_refresh_id: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        DELETE FROM analytics_refresh_log
        WHERE project_id = ?1
          AND trigger_type = ?2
          AND status = 'COMPLETED'
          AND refresh_id <> ?3
        "#,
        params![project_id, trigger_type, keep_refresh_id],
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsRefreshLogEntity {
    pub refresh_id: String,
    /// None 表示全量刷新
    pub project_id: Option<String>,
    pub trigger_type: String,
    pub trigger_source: Option<String>,
    pub rows_affected: i64,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub duration_ms: Option<i64>,
    pub status: String,
    pub error_message: Option<String>,
}

pub struct AnalyticsRefreshRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AnalyticsRefreshRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        let repo = Self { conn };
        // best-effort: do not block app startup for missing tables.
        if let Err(e) = repo.ensure_tables() {
            tracing::warn!("analytics_refresh_log ensure failed: {}", e);
        }
        repo
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_tables(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(REFRESH_LOG_DDL)?;
        Ok(())
    }

    fn map_log(row: &Row) -> rusqlite::Result<AnalyticsRefreshLogEntity> {
        Ok(AnalyticsRefreshLogEntity {
            refresh_id: row.get(0)?,
            project_id: row.get(1)?,
            trigger_type: row.get(2)?,
            trigger_source: row.get(3)?,
            rows_affected: row.get(4)?,
            started_at: row.get(5)?,
            completed_at: row.get(6)?,
            duration_ms: row.get(7)?,
            status: row.get(8)?,
            error_message: row.get(9)?,
        })
    }

    /// 项目最近一次刷新（含全量刷新）
    pub fn latest_for_project(&self, project_id: &str) -> RepositoryResult<Option<AnalyticsRefreshLogEntity>> {
        let conn = self.get_conn()?;
        let entity = conn
            .query_row(
                r#"
                SELECT refresh_id, project_id, trigger_type, trigger_source, rows_affected,
                       started_at, completed_at, duration_ms, status, error_message
                FROM analytics_refresh_log
                WHERE project_id = ?1 OR project_id IS NULL
                ORDER BY started_at DESC, rowid DESC
                LIMIT 1
                "#,
                params![project_id],
                Self::map_log,
            )
            .optional()?;
        Ok(entity)
    }

    /// 清理超过保留期的日志，返回删除行数
    pub fn cleanup_older_than(&self, keep_days: i64) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        Ok(delete_logs_older_than(&conn, keep_days)?)
    }

    pub fn count(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM analytics_refresh_log", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub fn list_recent(&self, limit: usize) -> RepositoryResult<Vec<AnalyticsRefreshLogEntity>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT refresh_id, project_id, trigger_type, trigger_source, rows_affected,
                   started_at, completed_at, duration_ms, status, error_message
            FROM analytics_refresh_log
            ORDER BY started_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )?;
        let rows = stmt
            .query_map(params![limit as i64], Self::map_log)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
