// ==========================================
// 供应链跟踪系统 - 配置层
// ==========================================
// 职责: 系统配置管理
// 存储: config_kv 表
// ==========================================

pub mod analytics_config_trait;
pub mod config_manager;

// 重导出核心配置管理器
pub use analytics_config_trait::AnalyticsConfigReader;
pub use config_manager::{config_keys, ConfigManager};
