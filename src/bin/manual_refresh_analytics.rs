// Small dev utility: rebuild the project analytics view.
//
// Usage:
//   cargo run --bin manual_refresh_analytics -- [db_path] [project_id]
//
// Without a project_id every project is refreshed in one pass.
// Expired refresh log rows are pruned per analytics.refresh_log_retention_days.

use supply_tracker::analytics::services::{AnalyticsRefreshService, RefreshTrigger};
use supply_tracker::config::ConfigManager;
use supply_tracker::db::open_shared_connection;
use supply_tracker::repository::ProjectRepository;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    supply_tracker::logging::init();

    let mut args = std::env::args().skip(1);
    let db_path = args
        .next()
        .unwrap_or_else(|| "supply_tracker.db".to_string());

    let conn = open_shared_connection(&db_path)?;

    // 建表（刷新依赖项目/库存/订单表存在）
    let projects = ProjectRepository::new(conn.clone())?;
    supply_tracker::repository::SupplyRepository::new(conn.clone())?;
    let retention_days = ConfigManager::from_connection(conn.clone())
        .and_then(|config| config.refresh_log_retention_days())
        .map_err(|e| e.to_string())?;
    let service = AnalyticsRefreshService::new(conn)?.with_log_retention_days(retention_days);

    let source = Some("manual_refresh_analytics bin".to_string());
    match args
        .next()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
    {
        Some(project_id) => {
            if projects.find_project(&project_id)?.is_none() {
                return Err(format!("project not found: {}", project_id).into());
            }
            let report = service.refresh_project_report(&project_id, RefreshTrigger::ManualRefresh, source)?;
            println!("refresh_id={} rows={}", report.refresh_id, report.rows_affected);
        }
        None => {
            let report = service.refresh_all(RefreshTrigger::ManualRefresh, source)?;
            println!("refresh_id={} rows={}", report.refresh_id, report.rows_affected);
        }
    }

    Ok(())
}
