// ==========================================
// 后台导入系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// ==========================================

use crate::domain::ImportStep;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件格式不支持: {0}（仅支持 .csv / text/csv）")]
    UnsupportedFormat(String),

    #[error("文件读取失败: {0}")]
    FileReadError(String),

    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("文件为空或无有效数据")]
    EmptyFile,

    #[error("未找到有效表头")]
    NoHeaders,

    // ===== 字段与映射错误 =====
    #[error("字段定义非法: {0}")]
    InvalidSchema(String),

    #[error("CSV 列不存在: {0}")]
    UnknownColumn(String),

    #[error("目标字段不存在: {0}")]
    UnknownField(String),

    #[error("必填字段未映射: {}", .0.join(", "))]
    MissingRequiredFields(Vec<String>),

    // ===== 状态机错误 =====
    #[error("当前步骤 {step} 不允许操作: {action}")]
    InvalidTransition { step: ImportStep, action: String },

    // ===== 导入调用错误 =====
    #[error("存储导入失败: {0}")]
    Store(String),

    // ===== 数据库错误 =====
    #[error("数据库查询失败: {0}")]
    DatabaseQueryError(String),

    // ===== 配置错误 =====
    #[error("配置值格式错误 (key: {key}, value: {value}): {message}")]
    ConfigValueError {
        key: String,
        value: String,
        message: String,
    },

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// 是否属于输入拒绝类错误（会话回到 upload 步骤）
    pub fn is_input_rejection(&self) -> bool {
        matches!(
            self,
            ImportError::UnsupportedFormat(_)
                | ImportError::FileReadError(_)
                | ImportError::CsvParseError(_)
                | ImportError::EmptyFile
                | ImportError::NoHeaders
        )
    }
}

// 实现 From<std::io::Error>
impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::FileReadError(err.to_string())
    }
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

// 实现 From<rusqlite::Error>
impl From<rusqlite::Error> for ImportError {
    fn from(err: rusqlite::Error) -> Self {
        ImportError::DatabaseQueryError(err.to_string())
    }
}

/// Result 类型别名
pub type PipelineResult<T> = Result<T, ImportError>;
