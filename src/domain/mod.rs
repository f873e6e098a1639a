// ==========================================
// 后台导入系统 - 领域模型层
// ==========================================
// 职责: 定义字段模型、映射、行记录、导入结果
// 红线: 不含解析逻辑,不含数据访问逻辑
// ==========================================

pub mod mapping;
pub mod record;
pub mod result;
pub mod schema;

// 重导出核心类型
pub use mapping::{ColumnMapping, ColumnMappings};
pub use record::{FieldValue, FileInfo, ParsedCsv, RawRow, TransformedRow, UploadedFile};
pub use result::{ImportOutcome, ImportReport, ImportRequest, ImportResult, ImportStep};
pub use schema::{FieldDescriptor, FieldSchema, FieldType, ImportTarget};
