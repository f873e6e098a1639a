// ==========================================
// 后台导入系统 - 导入会话配置
// ==========================================
// 职责: 会话开始时一次性解析配置，之后只读
// ==========================================

use crate::config::config_manager::defaults;
use crate::config::import_config_trait::ImportConfigReader;
use crate::importer::PipelineResult;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct ImportSettings {
    pub timeout: Duration,          // 存储调用超时
    pub progress_batches: usize,    // 模拟推进批次数
    pub batch_pause: Duration,      // 每批停顿
    pub error_display_limit: usize, // 报告展示错误条数
    pub preview_row_limit: usize,   // 预览行数
    pub locale: String,             // 界面语言
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(defaults::IMPORT_TIMEOUT_MS),
            progress_batches: defaults::PROGRESS_BATCHES,
            batch_pause: Duration::from_millis(defaults::BATCH_PAUSE_MS),
            error_display_limit: defaults::ERROR_DISPLAY_LIMIT,
            preview_row_limit: defaults::PREVIEW_ROW_LIMIT,
            locale: defaults::LOCALE.to_string(),
        }
    }
}

impl ImportSettings {
    /// 从配置读取器加载
    pub async fn load<C>(reader: &C) -> PipelineResult<Self>
    where
        C: ImportConfigReader + ?Sized,
    {
        let settings = Self {
            timeout: Duration::from_millis(reader.get_import_timeout_ms().await?),
            progress_batches: reader.get_progress_batches().await?,
            batch_pause: Duration::from_millis(reader.get_batch_pause_ms().await?),
            error_display_limit: reader.get_error_display_limit().await?,
            preview_row_limit: reader.get_preview_row_limit().await?,
            locale: reader.get_locale().await?,
        };

        tracing::debug!(
            timeout_ms = settings.timeout.as_millis() as u64,
            progress_batches = settings.progress_batches,
            batch_pause_ms = settings.batch_pause.as_millis() as u64,
            locale = %settings.locale,
            "导入配置已加载"
        );
        Ok(settings)
    }
}
