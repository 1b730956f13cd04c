// ==========================================
// 供应链跟踪系统 - 项目数据变更事件
// ==========================================
// 职责: 定义项目数据变更事件与发布 trait，实现依赖倒置
// 说明: 仓储写操作发布事件，分析层订阅后失效/重算摘要
// 替代: 前端定时轮询检测新增机器
// ==========================================

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;

// ==========================================
// 变更事件类型
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectDataEventType {
    /// 项目创建
    ProjectCreated,
    /// 机器新增
    MachineAdded,
    /// 机器零件需求变更
    MachinePartChanged,
    /// 机器订单号变更
    OrderNumberChanged,
    /// 库存或订单行变更（影响 available / in_transit / invoiced）
    SupplyChanged,
    /// 分析视图已刷新
    AnalyticsRefreshed,
}

impl ProjectDataEventType {
    pub fn as_str(&self) -> &str {
        match self {
            ProjectDataEventType::ProjectCreated => "ProjectCreated",
            ProjectDataEventType::MachineAdded => "MachineAdded",
            ProjectDataEventType::MachinePartChanged => "MachinePartChanged",
            ProjectDataEventType::OrderNumberChanged => "OrderNumberChanged",
            ProjectDataEventType::SupplyChanged => "SupplyChanged",
            ProjectDataEventType::AnalyticsRefreshed => "AnalyticsRefreshed",
        }
    }

    /// 是否使分析视图失效（需要刷新后再读）
    pub fn invalidates_view(&self) -> bool {
        !matches!(self, ProjectDataEventType::AnalyticsRefreshed)
    }
}

/// 项目数据变更事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDataEvent {
    pub project_id: String,
    pub event_type: ProjectDataEventType,
    /// 受影响的机器（None 表示整个项目）
    pub machine_id: Option<String>,
    pub source: Option<String>,
}

impl ProjectDataEvent {
    pub fn project(project_id: String, event_type: ProjectDataEventType) -> Self {
        Self {
            project_id,
            event_type,
            machine_id: None,
            source: None,
        }
    }

    pub fn machine(project_id: String, machine_id: String, event_type: ProjectDataEventType) -> Self {
        Self {
            project_id,
            event_type,
            machine_id: Some(machine_id),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 项目数据事件发布者
///
/// 仓储层持有 `Arc<dyn ProjectDataEventPublisher>`，分析层实现
pub trait ProjectDataEventPublisher: Send + Sync {
    /// 发布事件，返回当前接收者数量
    fn publish(&self, event: ProjectDataEvent) -> Result<usize, Box<dyn Error + Send + Sync>>;
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn ProjectDataEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn ProjectDataEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件（未配置发布者时跳过）；发布失败只记录日志，不影响写操作
    pub fn publish(&self, event: ProjectDataEvent) {
        let Some(publisher) = &self.inner else {
            tracing::debug!(
                "OptionalEventPublisher: 未配置发布者，跳过事件 - project_id={}, event_type={}",
                event.project_id,
                event.event_type.as_str()
            );
            return;
        };

        let project_id = event.project_id.clone();
        let event_type = event.event_type.as_str().to_string();
        if let Err(e) = publisher.publish(event) {
            tracing::warn!(
                project_id = %project_id,
                event_type = %event_type,
                "项目数据事件发布失败: {}",
                e
            );
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
