// ==========================================
// 后台导入系统 - 导入层
// ==========================================
// 职责: 文件解析 → 列映射 → 类型转换；示例文件生成
// 支持: CSV
// ==========================================

// 模块声明
pub mod column_mapper;
pub mod error;
pub mod file_parser;
pub mod import_trait;
pub mod row_transformer;
pub mod sample_export;

// 重导出核心类型
pub use column_mapper::ColumnMapper;
pub use error::{ImportError, PipelineResult};
pub use file_parser::CsvParser;
pub use row_transformer::RowTransformer;
pub use sample_export::SampleExporter;

// 重导出 Trait 接口
pub use import_trait::{FileParser, RecordImporter};
