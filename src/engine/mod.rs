// ==========================================
// 后台导入系统 - 引擎层
// ==========================================
// 职责: 导入会话状态机、进度跟踪、结果报告、事件发布
// 红线: 引擎不拼 SQL，存储只通过 RecordImporter 访问
// ==========================================

pub mod events;
pub mod orchestrator;
pub mod progress;
pub mod reporter;

// 重导出核心引擎
pub use events::{
    ChannelEventPublisher, ImportEvent, ImportEventPublisher, NoOpEventPublisher, NoticeLevel,
    SharedEventPublisher,
};
pub use orchestrator::{CompletedImport, ImportOrchestrator, PreviewColumn, PreviewTable, StagedFile};
pub use progress::{ProgressPhase, ProgressSnapshot, ProgressTracker, Throughput};
pub use reporter::ResultReporter;
