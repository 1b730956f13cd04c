// ==========================================
// 供应链跟踪系统 - 分析视图刷新服务
// ==========================================
// 职责: 重建 mv_project_analytics_complete（机器×零件 预计算视图）
// 数据来源: project_machine_parts / stock / orders / project_machine_order_numbers
// ==========================================
// 口径:
// - required / used: 取自 project_machine_parts
// - available: stock.quantity_available（按零件号，不区分机器）
// - in_transit: 机器关联订单中 BACKORDER 状态的数量合计
// - invoiced: 机器关联订单中 INVOICED 状态的数量合计
// - latest_eta: 未到货订单(BACKORDER/INVOICED)的最大 eta
// ==========================================

use crate::engine::events::{
    OptionalEventPublisher, ProjectDataEvent, ProjectDataEventPublisher, ProjectDataEventType,
};
use crate::repository::analytics_refresh_repo::{
    delete_logs_older_than, delete_superseded_logs, DEFAULT_LOG_RETENTION_DAYS, REFRESH_LOG_DDL,
};
use crate::repository::analytics_repo::ANALYTICS_VIEW_DDL;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::Utc;
use rusqlite::{params, Connection, Transaction};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 刷新触发类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// 读取摘要前的刷新
    BeforeRead,
    /// 项目数据变更
    DataChanged,
    /// 手动刷新
    ManualRefresh,
}

impl RefreshTrigger {
    pub fn as_str(&self) -> &str {
        match self {
            RefreshTrigger::BeforeRead => "BeforeRead",
            RefreshTrigger::DataChanged => "DataChanged",
            RefreshTrigger::ManualRefresh => "ManualRefresh",
        }
    }
}

/// 分析视图刷新接口
///
/// 读取链路只依赖此 trait，刷新失败由调用方降级处理
pub trait AnalyticsViewRefresher: Send + Sync {
    /// 刷新单个项目的分析视图，返回 refresh_id
    fn refresh_project(
        &self,
        project_id: &str,
        trigger: RefreshTrigger,
        trigger_source: Option<String>,
    ) -> RepositoryResult<String>;
}

/// 刷新结果
#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub refresh_id: String,
    pub rows_affected: usize,
    pub duration_ms: i64,
}

const REBUILD_VIEW_SQL: &str = r#"
    INSERT INTO mv_project_analytics_complete (
        project_id,
        machine_id,
        part_number,
        description,
        quantity_required,
        quantity_available,
        quantity_used,
        quantity_in_transit,
        quantity_invoiced,
        latest_eta,
        refreshed_at
    )
    SELECT
        pm.project_id,
        pmp.machine_id,
        pmp.part_number,
        pmp.description,
        pmp.quantity_required,
        COALESCE((
            SELECT s.quantity_available FROM stock s
            WHERE s.part_number = pmp.part_number
        ), 0),
        pmp.quantity_used,
        COALESCE((
            SELECT SUM(o.quantity)
            FROM orders o
            JOIN project_machine_order_numbers pon ON pon.order_number = o.order_number
            WHERE pon.machine_id = pmp.machine_id
              AND o.part_number = pmp.part_number
              AND o.status = 'BACKORDER'
        ), 0),
        COALESCE((
            SELECT SUM(o.quantity)
            FROM orders o
            JOIN project_machine_order_numbers pon ON pon.order_number = o.order_number
            WHERE pon.machine_id = pmp.machine_id
              AND o.part_number = pmp.part_number
              AND o.status = 'INVOICED'
        ), 0),
        (
            SELECT MAX(o.eta)
            FROM orders o
            JOIN project_machine_order_numbers pon ON pon.order_number = o.order_number
            WHERE pon.machine_id = pmp.machine_id
              AND o.part_number = pmp.part_number
              AND o.status IN ('BACKORDER', 'INVOICED')
              AND o.eta IS NOT NULL
        ),
        ?2
    FROM project_machine_parts pmp
    JOIN project_machines pm ON pm.id = pmp.machine_id
    WHERE (?1 IS NULL OR pm.project_id = ?1)
"#;

/// 分析视图刷新服务
///
/// 每次刷新后清理日志: 同项目同触发类型只保留最新一条成功记录，
/// 其余记录按保留天数过期
pub struct AnalyticsRefreshService {
    conn: Arc<Mutex<Connection>>,
    publisher: OptionalEventPublisher,
    log_retention_days: i64,
}

impl AnalyticsRefreshService {
    pub fn new(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        let service = Self {
            conn,
            publisher: OptionalEventPublisher::none(),
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
        };
        service.ensure_tables()?;
        Ok(service)
    }

    /// 刷新成功后发布 AnalyticsRefreshed 事件
    pub fn with_publisher(
        conn: Arc<Mutex<Connection>>,
        publisher: Arc<dyn ProjectDataEventPublisher>,
    ) -> RepositoryResult<Self> {
        let service = Self {
            conn,
            publisher: OptionalEventPublisher::with_publisher(publisher),
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
        };
        service.ensure_tables()?;
        Ok(service)
    }

    pub fn with_log_retention_days(mut self, keep_days: i64) -> Self {
        self.log_retention_days = keep_days;
        self
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn ensure_tables(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(ANALYTICS_VIEW_DDL)?;
        conn.execute_batch(REFRESH_LOG_DDL)?;
        Ok(())
    }

    /// 全量刷新（所有项目）
    pub fn refresh_all(
        &self,
        trigger: RefreshTrigger,
        trigger_source: Option<String>,
    ) -> RepositoryResult<RefreshReport> {
        self.run_refresh(None, &trigger, trigger_source.as_deref())
    }

    /// 刷新单个项目
    pub fn refresh_project_report(
        &self,
        project_id: &str,
        trigger: RefreshTrigger,
        trigger_source: Option<String>,
    ) -> RepositoryResult<RefreshReport> {
        let report = self.run_refresh(Some(project_id), &trigger, trigger_source.as_deref())?;
        self.publisher.publish(
            ProjectDataEvent::project(project_id.to_string(), ProjectDataEventType::AnalyticsRefreshed)
                .with_source(trigger.as_str()),
        );
        Ok(report)
    }

    fn run_refresh(
        &self,
        project_id: Option<&str>,
        trigger: &RefreshTrigger,
        trigger_source: Option<&str>,
    ) -> RepositoryResult<RefreshReport> {
        let refresh_id = Uuid::new_v4().to_string();
        let started = Utc::now();
        let started_at = started.to_rfc3339();

        let mut conn = self.get_conn()?;

        let outcome = {
            let tx = conn.transaction()?;
            match Self::rebuild_view(&tx, &refresh_id, project_id, trigger, trigger_source, &started_at) {
                Ok(rows) => tx.commit().map(|_| rows).map_err(RepositoryError::from),
                Err(e) => Err(e),
            }
        };

        let completed = Utc::now();
        let duration_ms = (completed - started).num_milliseconds();

        match outcome {
            Ok(rows_affected) => {
                tracing::info!(
                    "分析视图刷新完成: refresh_id={}, project_id={:?}, trigger={}, rows={}, duration_ms={}",
                    refresh_id,
                    project_id,
                    trigger.as_str(),
                    rows_affected,
                    duration_ms
                );
                self.prune_log(&conn, project_id, trigger, Some(&refresh_id));
                Ok(RefreshReport {
                    refresh_id,
                    rows_affected,
                    duration_ms,
                })
            }
            Err(e) => {
                tracing::warn!(
                    "分析视图刷新失败: refresh_id={}, project_id={:?}, error={}",
                    refresh_id,
                    project_id,
                    e
                );
                // 事务已回滚，单独记录失败日志（best-effort）
                if let Err(log_err) = conn.execute(
                    r#"
                    INSERT INTO analytics_refresh_log (
                        refresh_id, project_id, trigger_type, trigger_source,
                        started_at, completed_at, duration_ms, status, error_message
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'FAILED', ?8)
                    "#,
                    params![
                        refresh_id,
                        project_id,
                        trigger.as_str(),
                        trigger_source,
                        started_at,
                        completed.to_rfc3339(),
                        duration_ms,
                        e.to_string(),
                    ],
                ) {
                    tracing::warn!("记录刷新失败日志失败: {}", log_err);
                }
                self.prune_log(&conn, project_id, trigger, None);
                Err(e)
            }
        }
    }

    /// 日志清理（best-effort，失败不影响刷新结果）
    fn prune_log(
        &self,
        conn: &Connection,
        project_id: Option<&str>,
        trigger: &RefreshTrigger,
        completed_refresh_id: Option<&str>,
    ) {
        if let (Some(project_id), Some(refresh_id)) = (project_id, completed_refresh_id) {
            if let Err(e) = delete_superseded_logs(conn, project_id, trigger.as_str(), refresh_id) {
                tracing::warn!(project_id = %project_id, "清理被取代的刷新日志失败: {}", e);
            }
        }
        match delete_logs_older_than(conn, self.log_retention_days) {
            Ok(0) => {}
            Ok(n) => tracing::debug!("已清理过期刷新日志: {} 条", n),
            Err(e) => tracing::warn!("清理过期刷新日志失败: {}", e),
        }
    }

    fn rebuild_view(
        tx: &Transaction,
        refresh_id: &str,
        project_id: Option<&str>,
        trigger: &RefreshTrigger,
        trigger_source: Option<&str>,
        started_at: &str,
    ) -> RepositoryResult<usize> {
        tx.execute(
            r#"
            INSERT INTO analytics_refresh_log (
                refresh_id, project_id, trigger_type, trigger_source, started_at, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, 'RUNNING')
            "#,
            params![refresh_id, project_id, trigger.as_str(), trigger_source, started_at],
        )?;

        // 删除旧数据（包含已被删除机器遗留的行）
        tx.execute(
            r#"
            DELETE FROM mv_project_analytics_complete
            WHERE ?1 IS NULL
               OR project_id = ?1
               OR machine_id IN (SELECT id FROM project_machines WHERE project_id = ?1)
            "#,
            params![project_id],
        )?;

        let refreshed_at = Utc::now().to_rfc3339();
        let rows = tx.execute(REBUILD_VIEW_SQL, params![project_id, refreshed_at])?;

        let completed_at = Utc::now().to_rfc3339();
        tx.execute(
            r#"
            UPDATE analytics_refresh_log
            SET status = 'COMPLETED',
                rows_affected = ?2,
                completed_at = ?3,
                duration_ms = CAST((julianday(?3) - julianday(started_at)) * 86400000 AS INTEGER)
            WHERE refresh_id = ?1
            "#,
            params![refresh_id, rows as i64, completed_at],
        )?;

        Ok(rows)
    }
}

impl AnalyticsViewRefresher for AnalyticsRefreshService {
    fn refresh_project(
        &self,
        project_id: &str,
        trigger: RefreshTrigger,
        trigger_source: Option<String>,
    ) -> RepositoryResult<String> {
        self.refresh_project_report(project_id, trigger, trigger_source)
            .map(|report| report.refresh_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_shared;
    use crate::domain::project::MachinePartRequirement;
    use crate::domain::types::OrderStatus;
    use crate::repository::analytics_refresh_repo::AnalyticsRefreshRepository;
    use crate::repository::analytics_repo::AnalyticsRepository;
    use crate::repository::project_repo::ProjectRepository;
    use crate::repository::supply_repo::{OrderLine, SupplyRepository};

    struct Fixture {
        conn: Arc<Mutex<Connection>>,
        projects: ProjectRepository,
        supply: SupplyRepository,
        analytics: AnalyticsRepository,
        service: AnalyticsRefreshService,
    }

    fn setup() -> Fixture {
        let conn = open_in_memory_shared().unwrap();
        Fixture {
            projects: ProjectRepository::new(conn.clone()).unwrap(),
            supply: SupplyRepository::new(conn.clone()).unwrap(),
            analytics: AnalyticsRepository::new(conn.clone()).unwrap(),
            service: AnalyticsRefreshService::new(conn.clone()).unwrap(),
            conn,
        }
    }

    fn order(order_number: &str, part: &str, qty: f64, status: OrderStatus, eta: Option<&str>) -> OrderLine {
        OrderLine {
            order_number: order_number.to_string(),
            part_number: part.to_string(),
            quantity: qty,
            status,
            eta: eta.map(|s| s.to_string()),
        }
    }

    #[test]
    fn test_refresh_builds_rows_from_sources() {
        let f = setup();
        let project = f.projects.create_project("Line A", None).unwrap();
        let machine = f.projects.add_machine(&project.id, "Press", None, None).unwrap();
        f.projects
            .upsert_machine_part(&MachinePartRequirement {
                machine_id: machine.id.clone(),
                part_number: "P1".to_string(),
                description: Some("Bearing".to_string()),
                quantity_required: 10.0,
                quantity_used: 2.0,
            })
            .unwrap();
        f.projects.add_machine_order_number(&machine.id, "SO-1").unwrap();
        f.projects.add_machine_order_number(&machine.id, "SO-2").unwrap();
        f.supply.upsert_stock("P1", 3.0).unwrap();
        f.supply
            .upsert_order_line(&order("SO-1", "P1", 1.0, OrderStatus::Backorder, Some("2026-03-01")))
            .unwrap();
        f.supply
            .upsert_order_line(&order("SO-2", "P1", 2.0, OrderStatus::Invoiced, Some("2026-02-10")))
            .unwrap();
        // 未关联到机器的订单不计入
        f.supply
            .upsert_order_line(&order("SO-9", "P1", 50.0, OrderStatus::Backorder, Some("2027-01-01")))
            .unwrap();

        let report = f
            .service
            .refresh_project_report(&project.id, RefreshTrigger::ManualRefresh, None)
            .unwrap();
        assert_eq!(report.rows_affected, 1);

        let rows = f.analytics.list_project_rows(&project.id).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.quantity_required, 10.0);
        assert_eq!(row.quantity_available, 3.0);
        assert_eq!(row.quantity_used, 2.0);
        assert_eq!(row.quantity_in_transit, 1.0);
        assert_eq!(row.quantity_invoiced, 2.0);
        assert_eq!(row.quantity_missing, 2.0);
        assert_eq!(row.latest_eta.as_deref(), Some("2026-03-01"));

        let log = AnalyticsRefreshRepository::new(f.conn.clone())
            .latest_for_project(&project.id)
            .unwrap()
            .unwrap();
        assert_eq!(log.refresh_id, report.refresh_id);
        assert_eq!(log.status, "COMPLETED");
        assert_eq!(log.rows_affected, 1);
    }

    #[test]
    fn test_refresh_replaces_stale_rows() {
        let f = setup();
        let project = f.projects.create_project("Line A", None).unwrap();
        let machine = f.projects.add_machine(&project.id, "Press", None, None).unwrap();
        let mut req = MachinePartRequirement {
            machine_id: machine.id.clone(),
            part_number: "P1".to_string(),
            description: None,
            quantity_required: 4.0,
            quantity_used: 0.0,
        };
        f.projects.upsert_machine_part(&req).unwrap();
        f.service.refresh_all(RefreshTrigger::ManualRefresh, None).unwrap();

        req.quantity_used = 4.0;
        f.projects.upsert_machine_part(&req).unwrap();
        f.service
            .refresh_project(&project.id, RefreshTrigger::DataChanged, None)
            .unwrap();

        let rows = f.analytics.list_project_rows(&project.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity_used, 4.0);
    }

    #[test]
    fn test_failed_refresh_is_logged_and_keeps_old_rows() {
        let f = setup();
        let project = f.projects.create_project("Line A", None).unwrap();
        let machine = f.projects.add_machine(&project.id, "Press", None, None).unwrap();
        f.projects
            .upsert_machine_part(&MachinePartRequirement {
                machine_id: machine.id.clone(),
                part_number: "P1".to_string(),
                description: None,
                quantity_required: 4.0,
                quantity_used: 1.0,
            })
            .unwrap();
        f.service
            .refresh_project(&project.id, RefreshTrigger::ManualRefresh, None)
            .unwrap();

        // 破坏数据源，使刷新失败
        f.conn.lock().unwrap().execute_batch("DROP TABLE stock;").unwrap();

        let err = f
            .service
            .refresh_project(&project.id, RefreshTrigger::BeforeRead, Some("test".to_string()));
        assert!(err.is_err());

        let rows = f.analytics.list_project_rows(&project.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity_used, 1.0);

        let log = AnalyticsRefreshRepository::new(f.conn.clone())
            .latest_for_project(&project.id)
            .unwrap()
            .unwrap();
        assert_eq!(log.status, "FAILED");
        assert!(log.error_message.is_some());
    }

    #[test]
    fn test_repeated_refresh_keeps_log_bounded() {
        let f = setup();
        let project = f.projects.create_project("Line A", None).unwrap();
        let machine = f.projects.add_machine(&project.id, "Press", None, None).unwrap();
        f.projects
            .upsert_machine_part(&MachinePartRequirement {
                machine_id: machine.id.clone(),
                part_number: "P1".to_string(),
                description: None,
                quantity_required: 4.0,
                quantity_used: 1.0,
            })
            .unwrap();

        let manual = f
            .service
            .refresh_project_report(&project.id, RefreshTrigger::ManualRefresh, None)
            .unwrap();
        let mut last = String::new();
        for _ in 0..20 {
            last = f
                .service
                .refresh_project(&project.id, RefreshTrigger::BeforeRead, None)
                .unwrap();
        }

        // 每个触发类型仅保留最新一条成功记录
        let logs = AnalyticsRefreshRepository::new(f.conn.clone());
        assert_eq!(logs.count().unwrap(), 2);
        let ids: Vec<String> = logs.list_recent(10).unwrap().into_iter().map(|l| l.refresh_id).collect();
        assert!(ids.contains(&last));
        assert!(ids.contains(&manual.refresh_id));
    }
}
