// ==========================================
// 供应链跟踪系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 系统定位: 项目物料供应分析（可用/已用/在途/已开票/缺件）
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "zh-CN");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 聚合口径与变更事件
pub mod engine;

// 分析层 - 视图刷新、读取、变更通知
pub mod analytics;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{OrderStatus, SharedPartMerge};

// 领域实体
pub use domain::{MachinePartRecord, MachineSummary, Project, ProjectMachine, ProjectSummary};

// 引擎
pub use engine::AnalyticsAggregator;

// API
pub use api::{ProjectAnalyticsApi, ProjectAnalyticsResponse, ProjectComparisonRow};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "供应链跟踪系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
