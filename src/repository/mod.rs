// ==========================================
// 供应链跟踪系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod analytics_refresh_repo;
pub mod analytics_repo;
pub mod error;
pub mod project_repo;
pub mod supply_repo;

// 重导出核心仓储
pub use analytics_refresh_repo::{AnalyticsRefreshLogEntity, AnalyticsRefreshRepository};
pub use analytics_repo::AnalyticsRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use project_repo::ProjectRepository;
pub use supply_repo::{OrderLine, SupplyRepository};
