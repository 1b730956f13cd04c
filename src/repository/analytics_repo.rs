// ==========================================
// 供应链跟踪系统 - 项目分析视图仓储
// ==========================================
// 职责: 读取 mv_project_analytics_complete（机器×零件 预计算视图）
// 说明: 视图由 AnalyticsRefreshService 重建；本仓储只读
// ==========================================

use crate::domain::analytics::MachinePartRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

/// 建表语句（刷新服务与仓储共用）
pub(crate) const ANALYTICS_VIEW_DDL: &str = r#"
    CREATE TABLE IF NOT EXISTS mv_project_analytics_complete (
      project_id TEXT NOT NULL,
      machine_id TEXT NOT NULL,
      part_number TEXT NOT NULL,
      description TEXT,
      quantity_required REAL,
      quantity_available REAL,
      quantity_used REAL,
      quantity_in_transit REAL,
      quantity_invoiced REAL,
      latest_eta TEXT,
      refreshed_at TEXT NOT NULL DEFAULT (datetime('now')),
      PRIMARY KEY (machine_id, part_number)
    );

    CREATE INDEX IF NOT EXISTS idx_mv_analytics_project
      ON mv_project_analytics_complete(project_id);
"#;

pub struct AnalyticsRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AnalyticsRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let repo = Self { conn };
        repo.ensure_table()?;
        Ok(repo)
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_table(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(ANALYTICS_VIEW_DDL)?;
        Ok(())
    }

    /// 查询项目的全部分析行
    ///
    /// 按项目机器过滤（JOIN project_machines），不信任视图中冗余的 project_id；
    /// 数量为 NULL 时按 0 处理
    pub fn list_project_rows(&self, project_id: &str) -> RepositoryResult<Vec<MachinePartRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                mv.machine_id,
                mv.part_number,
                mv.description,
                mv.quantity_required,
                mv.quantity_available,
                mv.quantity_used,
                mv.quantity_in_transit,
                mv.quantity_invoiced,
                mv.latest_eta
            FROM mv_project_analytics_complete mv
            JOIN project_machines pm ON pm.id = mv.machine_id
            WHERE pm.project_id = ?1
            ORDER BY pm.created_at ASC, pm.rowid ASC, mv.part_number ASC
            "#,
        )?;

        let rows = stmt
            .query_map(params![project_id], |row| {
                Ok(MachinePartRecord::new(
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                    row.get::<_, Option<f64>>(4)?.unwrap_or(0.0),
                    row.get::<_, Option<f64>>(5)?.unwrap_or(0.0),
                    row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
                    row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
                    row.get(8)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(project_id = project_id, count = rows.len(), "读取分析视图行");
        Ok(rows)
    }
}
