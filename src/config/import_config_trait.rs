// ==========================================
// 后台导入系统 - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入流程所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::importer::PipelineResult;
use async_trait::async_trait;

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 用途: 导入编排所需的配置读取接口
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    // ===== 导入调用 =====

    /// 存储调用超时（毫秒）
    ///
    /// # 默认值
    /// - 360000（6 分钟）
    async fn get_import_timeout_ms(&self) -> PipelineResult<u64>;

    // ===== 进度展示 =====

    /// 模拟推进的批次数
    ///
    /// # 默认值
    /// - 20
    async fn get_progress_batches(&self) -> PipelineResult<usize>;

    /// 每个模拟批次后的停顿（毫秒）
    ///
    /// # 默认值
    /// - 40
    async fn get_batch_pause_ms(&self) -> PipelineResult<u64>;

    // ===== 结果展示 =====

    /// 报告中展示的错误条数上限
    ///
    /// # 默认值
    /// - 15
    async fn get_error_display_limit(&self) -> PipelineResult<usize>;

    /// 预览表行数
    ///
    /// # 默认值
    /// - 5
    async fn get_preview_row_limit(&self) -> PipelineResult<usize>;

    /// 界面语言
    ///
    /// # 默认值
    /// - pt-BR
    async fn get_locale(&self) -> PipelineResult<String>;
}
