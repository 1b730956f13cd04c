// ==========================================
// 供应链跟踪系统 - 分析层
// ==========================================
// 架构原则:
// - 分析层对外只输出摘要，不暴露视图表结构
// - 视图刷新失败时降级为读取旧数据，并告知调用方
// - 聚合口径统一在 engine::analytics_aggregator 中定义
// ==========================================

pub mod services;

pub use services::{
    AnalyticsFetcher, AnalyticsRefreshService, AnalyticsSnapshot, AnalyticsViewRefresher,
    ProjectChangeNotifier, RefreshOutcome, RefreshTrigger,
};
