// ==========================================
// 供应链跟踪系统 - 项目变更通知
// ==========================================
// 职责: 实现 Engine 层定义的 ProjectDataEventPublisher trait
// 说明: 通过 tokio broadcast 通道向订阅者推送项目数据变更，
//       订阅者据此失效/重算摘要，替代定时轮询
// ==========================================

use crate::engine::events::{ProjectDataEvent, ProjectDataEventPublisher};
use std::error::Error;
use tokio::sync::broadcast;

/// 默认通道容量（慢订阅者超出后丢失最旧事件）
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct ProjectChangeNotifier {
    sender: broadcast::Sender<ProjectDataEvent>,
}

impl ProjectChangeNotifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 订阅项目变更
    pub fn subscribe(&self) -> broadcast::Receiver<ProjectDataEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ProjectChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectDataEventPublisher for ProjectChangeNotifier {
    /// 返回收到事件的订阅者数量；无订阅者时返回 0
    fn publish(&self, event: ProjectDataEvent) -> Result<usize, Box<dyn Error + Send + Sync>> {
        match self.sender.send(event) {
            Ok(count) => Ok(count),
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(
                    project_id = %event.project_id,
                    event_type = event.event_type.as_str(),
                    "无订阅者，事件丢弃"
                );
                Ok(0)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::ProjectDataEventType;

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let notifier = ProjectChangeNotifier::new();
        let delivered = notifier
            .publish(ProjectDataEvent::project(
                "PRJ1".to_string(),
                ProjectDataEventType::ProjectCreated,
            ))
            .unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_machine_added() {
        let notifier = ProjectChangeNotifier::new();
        let mut rx = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 1);

        notifier
            .publish(ProjectDataEvent::machine(
                "PRJ1".to_string(),
                "M1".to_string(),
                ProjectDataEventType::MachineAdded,
            ))
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.project_id, "PRJ1");
        assert_eq!(event.machine_id.as_deref(), Some("M1"));
        assert!(event.event_type.invalidates_view());
    }
}
