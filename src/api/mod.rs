// ==========================================
// 供应链跟踪系统 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供 CLI 与上层应用调用
// ==========================================

pub mod error;
pub mod export;
pub mod project_analytics_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use export::{project_summary_to_csv_string, write_parts_detail_csv, write_project_summary_csv};
pub use project_analytics_api::{ProjectAnalyticsApi, ProjectAnalyticsResponse, ProjectComparisonRow};
