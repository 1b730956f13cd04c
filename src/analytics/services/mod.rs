// ==========================================
// 供应链跟踪系统 - 分析服务层
// ==========================================
// 职责: 分析视图刷新、读取与变更通知
// ==========================================

pub mod change_notifier;
pub mod fetcher;
pub mod refresh_service;

pub use change_notifier::ProjectChangeNotifier;
pub use fetcher::{AnalyticsFetcher, AnalyticsSnapshot, RefreshOutcome};
pub use refresh_service::{AnalyticsRefreshService, AnalyticsViewRefresher, RefreshReport, RefreshTrigger};
