// ==========================================
// 后台导入系统 - 核心库
// ==========================================
// 职责: 通用 CSV 导入流水线
// 流程: 上传 → 列映射 → 预览 → 导入 → 结果
// 技术栈: Rust + SQLite
// ==========================================

// 初始化国际化系统
rust_i18n::i18n!("locales", fallback = "en");

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 字段、映射、行、结果
pub mod domain;

// 导入层 - 解析、映射、转换
pub mod importer;

// 引擎层 - 会话状态机与进度
pub mod engine;

// 配置层 - 系统配置
pub mod config;

// 数据仓储层 - 参考存储
pub mod repository;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// 国际化
pub mod i18n;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::{
    ColumnMapping, ColumnMappings, FieldDescriptor, FieldSchema, FieldType, FieldValue,
    ImportOutcome, ImportReport, ImportRequest, ImportResult, ImportStep, ImportTarget, RawRow,
    TransformedRow, UploadedFile,
};

// 导入组件
pub use importer::{
    ColumnMapper, CsvParser, FileParser, ImportError, PipelineResult, RecordImporter,
    RowTransformer, SampleExporter,
};

// 引擎
pub use engine::{ImportOrchestrator, ResultReporter};

// 配置
pub use config::{ConfigManager, ImportSettings};

// 仓储
pub use repository::SqliteRecordStore;

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "backoffice-csv-import";
