// ==========================================
// 供应链跟踪系统 - 项目分析 API
// ==========================================
// 职责: 项目摘要、机器明细、多项目对比、手动刷新
// 架构: API 层 → AnalyticsFetcher (读取) → AnalyticsAggregator (聚合)
// 约束: 读取与聚合为阻塞操作，在 tokio 阻塞线程池中执行
// ==========================================

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::analytics::services::fetcher::{AnalyticsFetcher, RefreshOutcome};
use crate::analytics::services::refresh_service::{AnalyticsViewRefresher, RefreshTrigger};
use crate::api::error::{ApiError, ApiResult};
use crate::config::AnalyticsConfigReader;
use crate::domain::analytics::{MachineSummary, ProjectSummary};
use crate::domain::types::SharedPartMerge;
use crate::engine::analytics_aggregator::AnalyticsAggregator;
use crate::config::config_manager::DEFAULT_LOCALE;
use crate::i18n::{t_in, t_with_args_in};
use crate::repository::error::RepositoryError;
use crate::repository::project_repo::ProjectRepository;

// ==========================================
// 响应类型
// ==========================================

/// 项目摘要响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectAnalyticsResponse {
    pub summary: ProjectSummary,
    /// 生成时间（RFC 3339）
    pub as_of: String,
    /// REFRESHED / SKIPPED / FAILED
    pub refresh_status: String,
    pub refresh_id: Option<String>,
    /// 本地化提示（刷新失败或未刷新时）
    pub warning: Option<String>,
}

/// 多项目对比行
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectComparisonRow {
    pub project_id: String,
    pub project_name: Option<String>,
    pub total_machines: usize,
    pub total_unique_parts: usize,
    pub availability_percentage: f64,
    pub usage_percentage: f64,
    pub transit_percentage: f64,
    pub invoiced_percentage: f64,
    pub missing_percentage: f64,
    pub refresh_status: Option<String>,
    /// 该项目汇总失败时的错误信息
    pub error: Option<String>,
}

impl ProjectComparisonRow {
    fn from_summary(summary: &ProjectSummary, refresh: &RefreshOutcome) -> Self {
        Self {
            project_id: summary.project_id.clone(),
            project_name: Some(summary.project_name.clone()),
            total_machines: summary.total_machines,
            total_unique_parts: summary.total_unique_parts,
            availability_percentage: summary.availability_percentage,
            usage_percentage: summary.usage_percentage,
            transit_percentage: summary.transit_percentage,
            invoiced_percentage: summary.invoiced_percentage,
            missing_percentage: summary.missing_percentage,
            refresh_status: Some(refresh.status_str().to_string()),
            error: None,
        }
    }

    fn from_error(project_id: &str, err: &ApiError) -> Self {
        Self {
            project_id: project_id.to_string(),
            project_name: None,
            total_machines: 0,
            total_unique_parts: 0,
            availability_percentage: 0.0,
            usage_percentage: 0.0,
            transit_percentage: 0.0,
            invoiced_percentage: 0.0,
            missing_percentage: 0.0,
            refresh_status: None,
            error: Some(err.to_string()),
        }
    }
}

/// 单次读取所用配置
#[derive(Debug, Clone)]
struct ReadSettings {
    refresh_before_read: bool,
    merge_policy: SharedPartMerge,
    /// 提示与错误信息的语言（ui.locale），不修改全局 locale
    locale: String,
}

// ==========================================
// ProjectAnalyticsApi
// ==========================================

/// 项目分析 API
///
/// 提示与错误信息按每次调用读到的 ui.locale 翻译
pub struct ProjectAnalyticsApi {
    project_repo: Arc<ProjectRepository>,
    fetcher: Arc<AnalyticsFetcher>,
    refresher: Arc<dyn AnalyticsViewRefresher>,
    config: Arc<dyn AnalyticsConfigReader>,
}

impl ProjectAnalyticsApi {
    pub fn new(
        project_repo: Arc<ProjectRepository>,
        fetcher: Arc<AnalyticsFetcher>,
        refresher: Arc<dyn AnalyticsViewRefresher>,
        config: Arc<dyn AnalyticsConfigReader>,
    ) -> Self {
        Self {
            project_repo,
            fetcher,
            refresher,
            config,
        }
    }

    /// 项目摘要
    ///
    /// # 返回
    /// - Ok: 摘要 + 刷新状态；刷新失败时附带 warning，数据可能过期
    /// - Err(NotFound): 项目不存在
    /// - Err(InvalidInput): project_id 为空
    pub async fn get_project_summary(&self, project_id: &str) -> ApiResult<ProjectAnalyticsResponse> {
        let settings = self.read_settings().await;
        let project_id = require_id(project_id, &settings.locale)?;

        let fetcher = Arc::clone(&self.fetcher);
        let task_settings = settings.clone();
        let (summary, refresh) =
            tokio::task::spawn_blocking(move || summarize(&fetcher, &project_id, &task_settings)).await??;

        Ok(to_response(summary, refresh, &settings.locale))
    }

    /// 单台机器明细
    pub async fn get_machine_summary(&self, project_id: &str, machine_id: &str) -> ApiResult<MachineSummary> {
        let locale = self.read_locale().await;
        let machine_id = machine_id.trim().to_string();
        if machine_id.is_empty() {
            return Err(ApiError::InvalidInput(t_in(&locale, "analytics.empty_machine_id")));
        }

        let response = self.get_project_summary(project_id).await?;
        response
            .summary
            .machines
            .into_iter()
            .find(|m| m.machine_id == machine_id)
            .ok_or_else(|| {
                ApiError::NotFound(t_with_args_in(
                    &locale,
                    "analytics.machine_not_found",
                    &[("machine_id", machine_id.as_str())],
                ))
            })
    }

    /// 多项目对比（各项目并发汇总，单个失败不影响其他项目）
    pub async fn compare_projects(&self, project_ids: &[String]) -> ApiResult<Vec<ProjectComparisonRow>> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }
        let settings = self.read_settings().await;

        let tasks = project_ids.iter().map(|raw_id| {
            let fetcher = Arc::clone(&self.fetcher);
            let raw_id = raw_id.clone();
            let settings = settings.clone();
            async move {
                let result = match require_id(&raw_id, &settings.locale) {
                    Ok(project_id) => tokio::task::spawn_blocking(move || {
                        summarize(&fetcher, &project_id, &settings)
                    })
                    .await
                    .map_err(ApiError::from)
                    .and_then(|r| r),
                    Err(e) => Err(e),
                };
                match result {
                    Ok((summary, refresh)) => ProjectComparisonRow::from_summary(&summary, &refresh),
                    Err(e) => {
                        tracing::warn!(project_id = %raw_id, error = %e, "项目对比: 汇总失败");
                        ProjectComparisonRow::from_error(&raw_id, &e)
                    }
                }
            }
        });

        let rows = join_all(tasks).await;
        tracing::info!(projects = rows.len(), "项目对比完成");
        Ok(rows)
    }

    /// 手动刷新分析视图，返回 refresh_id
    pub async fn refresh_analytics(&self, project_id: &str, source: Option<String>) -> ApiResult<String> {
        let locale = self.read_locale().await;
        let project_id = require_id(project_id, &locale)?;
        let project_repo = Arc::clone(&self.project_repo);
        let refresher = Arc::clone(&self.refresher);

        tokio::task::spawn_blocking(move || -> ApiResult<String> {
            if project_repo.find_project(&project_id)?.is_none() {
                return Err(project_not_found(&project_id, &locale));
            }
            let refresh_id = refresher.refresh_project(&project_id, RefreshTrigger::ManualRefresh, source)?;
            Ok(refresh_id)
        })
        .await?
    }

    /// 读取配置；读取失败时使用默认值
    async fn read_settings(&self) -> ReadSettings {
        let refresh_before_read = match self.config.get_refresh_before_read().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("读取 refresh_before_read 失败，使用默认值: {}", e);
                true
            }
        };
        let merge_policy = match self.config.get_shared_part_merge().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("读取 shared_part_merge 失败，使用默认值: {}", e);
                SharedPartMerge::default()
            }
        };
        ReadSettings {
            refresh_before_read,
            merge_policy,
            locale: self.read_locale().await,
        }
    }

    async fn read_locale(&self) -> String {
        match self.config.get_locale().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("读取 ui.locale 失败，使用默认值: {}", e);
                DEFAULT_LOCALE.to_string()
            }
        }
    }
}

fn require_id(project_id: &str, locale: &str) -> ApiResult<String> {
    let trimmed = project_id.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput(t_in(locale, "analytics.empty_project_id")));
    }
    Ok(trimmed.to_string())
}

fn project_not_found(project_id: &str, locale: &str) -> ApiError {
    ApiError::NotFound(t_with_args_in(
        locale,
        "analytics.project_not_found",
        &[("project_id", project_id)],
    ))
}

/// 读取 + 聚合（阻塞）
fn summarize(
    fetcher: &AnalyticsFetcher,
    project_id: &str,
    settings: &ReadSettings,
) -> ApiResult<(ProjectSummary, RefreshOutcome)> {
    let snapshot = match fetcher.fetch(project_id, settings.refresh_before_read) {
        Ok(snapshot) => snapshot,
        Err(RepositoryError::NotFound { .. }) => return Err(project_not_found(project_id, &settings.locale)),
        Err(e) => return Err(e.into()),
    };

    let aggregator = AnalyticsAggregator::new(settings.merge_policy);
    let summary = aggregator.build_project_summary(&snapshot.project, &snapshot.machines, snapshot.rows);
    Ok((summary, snapshot.refresh))
}

fn to_response(summary: ProjectSummary, refresh: RefreshOutcome, locale: &str) -> ProjectAnalyticsResponse {
    let refresh_status = refresh.status_str().to_string();
    let (refresh_id, warning) = match refresh {
        RefreshOutcome::Refreshed { refresh_id } => (Some(refresh_id), None),
        RefreshOutcome::Skipped => (None, Some(t_in(locale, "analytics.refresh_skipped"))),
        RefreshOutcome::Failed { reason } => (
            None,
            Some(t_with_args_in(
                locale,
                "analytics.refresh_failed",
                &[("reason", reason.as_str())],
            )),
        ),
    };

    ProjectAnalyticsResponse {
        summary,
        as_of: Utc::now().to_rfc3339(),
        refresh_status,
        refresh_id,
        warning,
    }
}
