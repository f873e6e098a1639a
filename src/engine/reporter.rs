// ==========================================
// 后台导入系统 - 导入结果报告
// ==========================================
// 职责: ImportResult + 总行数 + 耗时 → ImportReport
// 展示: 三种结果分类各有独立文案；错误只展示前 N 条并给出剩余数
// ==========================================

use crate::domain::{ImportOutcome, ImportReport, ImportResult};
use crate::i18n::{t, t_with_args};
use std::time::Duration;

pub const DEFAULT_ERROR_DISPLAY_LIMIT: usize = 15;

#[derive(Debug, Clone)]
pub struct ResultReporter {
    error_limit: usize,
}

impl Default for ResultReporter {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_DISPLAY_LIMIT)
    }
}

impl ResultReporter {
    pub fn new(error_limit: usize) -> Self {
        Self { error_limit }
    }

    pub fn error_limit(&self) -> usize {
        self.error_limit
    }

    /// 生成报告
    ///
    /// # 参数
    /// - result: 存储端（或合成）的导入结果
    /// - total: 本次尝试导入的行数
    /// - elapsed: 从开始导入到结果落定的耗时
    pub fn report(&self, result: &ImportResult, total: usize, elapsed: Duration) -> ImportReport {
        let imported = result.imported.min(total);

        let success_rate = if total == 0 {
            0.0
        } else {
            imported as f64 / total as f64 * 100.0
        };

        let avg_per_record = if total == 0 {
            Duration::ZERO
        } else {
            elapsed.div_f64(total as f64)
        };

        let secs = elapsed.as_secs_f64();
        let records_per_second = if secs > 0.0 { total as f64 / secs } else { 0.0 };

        let shown = result.errors.len().min(self.error_limit);

        ImportReport {
            outcome: ImportOutcome::classify(result),
            message: result.message.clone(),
            total,
            imported,
            error_count: result.errors.len(),
            success_rate,
            elapsed,
            avg_per_record,
            records_per_second,
            shown_errors: result.errors[..shown].to_vec(),
            hidden_errors: result.errors.len() - shown,
        }
    }

    /// 结果分类的标题文案
    pub fn headline(&self, outcome: ImportOutcome) -> String {
        match outcome {
            ImportOutcome::Completed => t("report.completed"),
            ImportOutcome::CompletedWithErrors => t("report.completed_with_errors"),
            ImportOutcome::Failed => t("report.failed"),
        }
    }

    /// 渲染为多行文本（命令行输出、日志）
    pub fn render(&self, report: &ImportReport) -> String {
        let mut lines = vec![self.headline(report.outcome)];

        if !report.message.is_empty() {
            lines.push(report.message.clone());
        }

        lines.push(t_with_args(
            "report.summary",
            &[
                ("total", &report.total.to_string()),
                ("imported", &report.imported.to_string()),
                ("errors", &report.error_count.to_string()),
                ("rate", &format!("{:.1}", report.success_rate)),
            ],
        ));
        lines.push(t_with_args(
            "report.timing",
            &[
                ("elapsed", &format_duration(report.elapsed)),
                ("avg", &format_duration(report.avg_per_record)),
                ("rps", &format!("{:.1}", report.records_per_second)),
            ],
        ));

        if !report.shown_errors.is_empty() {
            lines.push(t("report.errors_header"));
            lines.extend(report.shown_errors.iter().map(|e| format!("  - {}", e)));
        }
        if report.hidden_errors > 0 {
            lines.push(t_with_args(
                "report.more_errors",
                &[("count", &report.hidden_errors.to_string())],
            ));
        }

        lines.join("\n")
    }
}

/// 耗时格式: < 1s 用毫秒，否则秒（两位小数）
pub fn format_duration(d: Duration) -> String {
    if d < Duration::from_secs(1) {
        format!("{}ms", d.as_millis())
    } else {
        format!("{:.2}s", d.as_secs_f64())
    }
}
