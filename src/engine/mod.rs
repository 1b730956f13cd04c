// ==========================================
// 供应链跟踪系统 - 引擎层
// ==========================================
// 红线: 引擎不直接访问数据库，输入输出均为领域对象
// ==========================================

pub mod analytics_aggregator;
pub mod events;

pub use analytics_aggregator::{capped_ratio, sanitize_record, AnalyticsAggregator, PERCENTAGE_CAP};
pub use events::{
    OptionalEventPublisher, ProjectDataEvent, ProjectDataEventPublisher, ProjectDataEventType,
};
