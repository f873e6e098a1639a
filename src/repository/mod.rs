// ==========================================
// 后台导入系统 - 数据仓储层
// ==========================================
// 职责: 提供导入结果的持久化实现,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod error;
pub mod sqlite_record_store;

// 重导出核心仓储
pub use error::{RepositoryError, RepositoryResult};
pub use sqlite_record_store::SqliteRecordStore;
