// ==========================================
// 后台导入系统 - 导入结果与会话步骤
// ==========================================
// 职责: 外部存储返回的导入结果、会话步骤枚举、导入请求
// ==========================================

use crate::domain::mapping::ColumnMapping;
use crate::domain::record::TransformedRow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

// ==========================================
// ImportStep - 会话步骤
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStep {
    Upload,
    Mapping,
    Preview,
    Importing,
    Done,
}

impl ImportStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStep::Upload => "upload",
            ImportStep::Mapping => "mapping",
            ImportStep::Preview => "preview",
            ImportStep::Importing => "importing",
            ImportStep::Done => "done",
        }
    }
}

impl fmt::Display for ImportStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// ImportRequest - 一次导入调用的请求体
// ==========================================
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub batch_token: Uuid,            // 客户端生成的批次令牌（幂等键）
    pub rows: Vec<TransformedRow>,    // 转换后的全部行
    pub mappings: Vec<ColumnMapping>, // 导入时刻冻结的映射
}

// ==========================================
// ImportResult - 外部存储返回的导入结果
// ==========================================
// success 表示"操作完成"，不表示"零错误"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    pub message: String,
    pub imported: usize,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ImportResult {
    /// 合成失败结果（超时/异常）
    pub fn failure(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            imported: 0,
            errors: vec![error.into()],
        }
    }

    pub fn error_count(&self) -> usize {
        self.errors.len()
    }
}

// ==========================================
// ImportOutcome - 结果展示分类
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
    Completed,           // 成功且零错误
    CompletedWithErrors, // 成功但部分行失败
    Failed,              // 操作失败（含超时/异常）
}

impl ImportOutcome {
    pub fn classify(result: &ImportResult) -> Self {
        match (result.success, result.errors.is_empty()) {
            (true, true) => ImportOutcome::Completed,
            (true, false) => ImportOutcome::CompletedWithErrors,
            (false, _) => ImportOutcome::Failed,
        }
    }
}

// ==========================================
// ImportReport - 最终报告
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub outcome: ImportOutcome,
    pub message: String,
    pub total: usize,              // 尝试导入的行数
    pub imported: usize,           // 成功导入的行数
    pub error_count: usize,        // 错误条数
    pub success_rate: f64,         // 成功率百分比（total 为 0 时为 0）
    pub elapsed: Duration,         // 总耗时
    pub avg_per_record: Duration,  // 平均每行耗时
    pub records_per_second: f64,   // 吞吐
    pub shown_errors: Vec<String>, // 展示的前 N 条错误
    pub hidden_errors: usize,      // 未展示的剩余错误数
}

impl ImportReport {
    pub fn is_success(&self) -> bool {
        self.outcome != ImportOutcome::Failed
    }
}
