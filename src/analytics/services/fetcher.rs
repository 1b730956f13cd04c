// ==========================================
// 供应链跟踪系统 - 分析数据读取
// ==========================================
// 职责: 读取项目、机器与分析视图行，读取前可选刷新视图
// 约束: 刷新失败不阻断读取，返回旧数据并标记 Failed
// ==========================================

use crate::analytics::services::refresh_service::{AnalyticsViewRefresher, RefreshTrigger};
use crate::domain::analytics::MachinePartRecord;
use crate::domain::project::{Project, ProjectMachine};
use crate::repository::analytics_repo::AnalyticsRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::project_repo::ProjectRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 读取前刷新的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RefreshOutcome {
    Refreshed { refresh_id: String },
    Skipped,
    Failed { reason: String },
}

impl RefreshOutcome {
    pub fn status_str(&self) -> &str {
        match self {
            RefreshOutcome::Refreshed { .. } => "REFRESHED",
            RefreshOutcome::Skipped => "SKIPPED",
            RefreshOutcome::Failed { .. } => "FAILED",
        }
    }

    /// 数据可能过期
    pub fn is_stale(&self) -> bool {
        matches!(self, RefreshOutcome::Failed { .. })
    }
}

/// 一次读取得到的项目分析原始数据
#[derive(Debug, Clone)]
pub struct AnalyticsSnapshot {
    pub project: Project,
    /// 按创建顺序
    pub machines: Vec<ProjectMachine>,
    pub rows: Vec<MachinePartRecord>,
    pub refresh: RefreshOutcome,
}

pub struct AnalyticsFetcher {
    project_repo: Arc<ProjectRepository>,
    analytics_repo: Arc<AnalyticsRepository>,
    refresher: Arc<dyn AnalyticsViewRefresher>,
}

impl AnalyticsFetcher {
    pub fn new(
        project_repo: Arc<ProjectRepository>,
        analytics_repo: Arc<AnalyticsRepository>,
        refresher: Arc<dyn AnalyticsViewRefresher>,
    ) -> Self {
        Self {
            project_repo,
            analytics_repo,
            refresher,
        }
    }

    /// 读取项目分析数据
    ///
    /// 顺序: 校验 → 查项目 → (可选)刷新视图 → 查机器 → 查视图行
    pub fn fetch(&self, project_id: &str, refresh_before_read: bool) -> RepositoryResult<AnalyticsSnapshot> {
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(RepositoryError::ValidationError("project_id 不能为空".to_string()));
        }

        let project = self
            .project_repo
            .find_project(project_id)?
            .ok_or_else(|| RepositoryError::not_found("Project", project_id))?;

        let refresh = if refresh_before_read {
            self.refresh_best_effort(project_id)
        } else {
            RefreshOutcome::Skipped
        };

        let machines = self.project_repo.list_machines(project_id)?;
        let rows = self.analytics_repo.list_project_rows(project_id)?;

        tracing::debug!(
            project_id = project_id,
            machines = machines.len(),
            rows = rows.len(),
            refresh = refresh.status_str(),
            "项目分析数据读取完成"
        );

        Ok(AnalyticsSnapshot {
            project,
            machines,
            rows,
            refresh,
        })
    }

    fn refresh_best_effort(&self, project_id: &str) -> RefreshOutcome {
        match self.refresher.refresh_project(
            project_id,
            RefreshTrigger::BeforeRead,
            Some("analytics_fetcher".to_string()),
        ) {
            Ok(refresh_id) => RefreshOutcome::Refreshed { refresh_id },
            Err(e) => {
                tracing::warn!(
                    project_id = project_id,
                    error = %e,
                    "读取前刷新分析视图失败，使用现有数据"
                );
                RefreshOutcome::Failed { reason: e.to_string() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_shared;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRefresher {
        calls: AtomicUsize,
        fail: bool,
    }

    impl AnalyticsViewRefresher for CountingRefresher {
        fn refresh_project(
            &self,
            _project_id: &str,
            _trigger: RefreshTrigger,
            _trigger_source: Option<String>,
        ) -> RepositoryResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(RepositoryError::DatabaseQueryError("view locked".to_string()))
            } else {
                Ok("R-1".to_string())
            }
        }
    }

    fn fetcher(fail: bool) -> (AnalyticsFetcher, Arc<ProjectRepository>, Arc<CountingRefresher>) {
        let conn = open_in_memory_shared().unwrap();
        let projects = Arc::new(ProjectRepository::new(conn.clone()).unwrap());
        let analytics = Arc::new(AnalyticsRepository::new(conn).unwrap());
        let refresher = Arc::new(CountingRefresher {
            calls: AtomicUsize::new(0),
            fail,
        });
        (
            AnalyticsFetcher::new(projects.clone(), analytics, refresher.clone()),
            projects,
            refresher,
        )
    }

    #[test]
    fn test_refresh_skipped_when_disabled() {
        let (fetcher, projects, refresher) = fetcher(false);
        let project = projects.create_project("Line A", None).unwrap();

        let snapshot = fetcher.fetch(&project.id, false).unwrap();
        assert_eq!(snapshot.refresh, RefreshOutcome::Skipped);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_refresh_failure_is_not_fatal() {
        let (fetcher, projects, refresher) = fetcher(true);
        let project = projects.create_project("Line A", None).unwrap();
        projects.add_machine(&project.id, "Press", None, None).unwrap();

        let snapshot = fetcher.fetch(&project.id, true).unwrap();
        assert!(snapshot.refresh.is_stale());
        assert_eq!(snapshot.refresh.status_str(), "FAILED");
        assert_eq!(snapshot.machines.len(), 1);
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_project_does_not_refresh() {
        let (fetcher, _projects, refresher) = fetcher(false);
        let err = fetcher.fetch("missing", true).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
        assert_eq!(refresher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_blank_project_id_rejected() {
        let (fetcher, _projects, _refresher) = fetcher(false);
        assert!(matches!(
            fetcher.fetch("  ", true),
            Err(RepositoryError::ValidationError(_))
        ));
    }
}
