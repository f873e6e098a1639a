// ==========================================
// 后台导入系统 - 引擎层事件发布
// ==========================================
// 职责: 定义导入事件发布 trait，编排器只依赖 trait
// 事件: 步骤切换 / 提示消息 / 进度快照
// 实现: NoOp（测试、命令行）与通道发布者（界面层订阅）
// ==========================================

use crate::domain::ImportStep;
use crate::engine::progress::ProgressSnapshot;
use serde::Serialize;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::mpsc;

// ==========================================
// 导入事件类型
// ==========================================

/// 提示级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl NoticeLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "success",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        }
    }
}

/// 导入事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportEvent {
    /// 会话步骤切换
    StepChanged { from: ImportStep, to: ImportStep },
    /// 面向操作员的提示
    Notice { level: NoticeLevel, message: String },
    /// 进度快照
    Progress(ProgressSnapshot),
}

impl ImportEvent {
    pub fn notice(level: NoticeLevel, message: impl Into<String>) -> Self {
        ImportEvent::Notice {
            level,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ImportEvent::StepChanged { .. } => "step_changed",
            ImportEvent::Notice { .. } => "notice",
            ImportEvent::Progress(_) => "progress",
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 导入事件发布者 Trait
///
/// 发布失败不影响导入流程，编排器只记录告警
pub trait ImportEventPublisher: Send + Sync {
    fn publish(&self, event: ImportEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl ImportEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: ImportEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::trace!("NoOpEventPublisher: 跳过事件发布 - kind={}", event.kind());
        Ok(())
    }
}

/// 通道事件发布者
///
/// 事件写入无界通道，由订阅端（界面层）消费
#[derive(Debug, Clone)]
pub struct ChannelEventPublisher {
    sender: mpsc::UnboundedSender<ImportEvent>,
}

impl ChannelEventPublisher {
    /// 创建发布者及其接收端
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ImportEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ImportEventPublisher for ChannelEventPublisher {
    fn publish(&self, event: ImportEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.sender
            .send(event)
            .map_err(|e| format!("事件订阅端已关闭: kind={}", e.0.kind()).into())
    }
}

/// 共享发布者
pub type SharedEventPublisher = Arc<dyn ImportEventPublisher>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_publisher() {
        let publisher = NoOpEventPublisher;
        let result = publisher.publish(ImportEvent::notice(NoticeLevel::Info, "ok"));
        assert!(result.is_ok());
    }

    #[test]
    fn test_channel_publisher_delivers_in_order() {
        let (publisher, mut receiver) = ChannelEventPublisher::channel();

        publisher
            .publish(ImportEvent::StepChanged {
                from: ImportStep::Upload,
                to: ImportStep::Mapping,
            })
            .unwrap();
        publisher
            .publish(ImportEvent::notice(NoticeLevel::Warning, "faltando"))
            .unwrap();

        assert_eq!(receiver.try_recv().unwrap().kind(), "step_changed");
        match receiver.try_recv().unwrap() {
            ImportEvent::Notice { level, message } => {
                assert_eq!(level, NoticeLevel::Warning);
                assert_eq!(message, "faltando");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_channel_publisher_closed_receiver() {
        let (publisher, receiver) = ChannelEventPublisher::channel();
        drop(receiver);

        let result = publisher.publish(ImportEvent::notice(NoticeLevel::Info, "x"));
        assert!(result.is_err());
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = ImportEvent::notice(NoticeLevel::Error, "falhou");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "notice");
        assert_eq!(json["level"], "error");
    }
}
