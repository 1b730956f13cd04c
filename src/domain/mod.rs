// ==========================================
// 供应链跟踪系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod analytics;
pub mod project;
pub mod types;

// 重导出核心类型
pub use analytics::{
    derive_missing, MachinePartRecord, MachineSummary, MetricPercentages, ProjectSummary,
};
pub use project::{MachinePartRequirement, Project, ProjectMachine};
pub use types::{OrderStatus, SharedPartMerge};
