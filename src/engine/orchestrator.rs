// ==========================================
// 后台导入系统 - 导入编排器
// ==========================================
// 状态机: upload → mapping → preview → importing → done
// - upload → mapping: 文件解析成功（自动映射作为初始建议）
// - mapping → preview: 必填字段全部映射
// - preview → mapping: 随时可返回
// - preview → importing: handle_import，不可撤销、不可取消
// - importing → done: 存储返回 / 失败 / 超时
// - 任意 → upload: reset
// 红线:
// - 转换后的行只在 handle_import 开始时生成一次，之后的映射修改不影响本次导入
// - handle_import 持有 &mut self，导入期间任何其他操作都无法进入
// ==========================================

use crate::config::ImportSettings;
use crate::domain::{
    ColumnMappings, FieldSchema, FileInfo, ImportReport, ImportRequest, ImportResult, ImportStep,
    ParsedCsv, UploadedFile,
};
use crate::engine::events::{
    ImportEvent, ImportEventPublisher, NoOpEventPublisher, NoticeLevel, SharedEventPublisher,
};
use crate::engine::progress::{
    sweep_plan, ProgressPhase, ProgressTracker, AWAITING_STORE, PREPARATION_STEPS,
};
use crate::engine::reporter::ResultReporter;
use crate::i18n::{t, t_with_args};
use crate::importer::{
    ColumnMapper, CsvParser, FileParser, ImportError, PipelineResult, RecordImporter,
    RowTransformer,
};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 预览单元格最大字符数
pub const PREVIEW_CELL_MAX_CHARS: usize = 50;

// ==========================================
// 会话状态
// ==========================================

/// 已解析、待映射/预览的文件
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub info: FileInfo,
    pub parsed: ParsedCsv,
    pub mappings: ColumnMappings,
}

/// 已结束的导入
#[derive(Debug, Clone)]
pub struct CompletedImport {
    pub info: FileInfo,
    pub batch_token: Uuid,
    pub result: ImportResult,
    pub report: ImportReport,
}

#[derive(Debug, Clone)]
enum SessionState {
    Upload,
    Mapping(StagedFile),
    Preview(StagedFile),
    Importing { info: FileInfo, total: usize },
    Done(CompletedImport),
}

impl SessionState {
    fn step(&self) -> ImportStep {
        match self {
            SessionState::Upload => ImportStep::Upload,
            SessionState::Mapping(_) => ImportStep::Mapping,
            SessionState::Preview(_) => ImportStep::Preview,
            SessionState::Importing { .. } => ImportStep::Importing,
            SessionState::Done(_) => ImportStep::Done,
        }
    }
}

// ==========================================
// 预览表
// ==========================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewColumn {
    pub csv_column: String,
    pub db_field: String,
    pub label: String, // 必填字段带 " *"
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewTable {
    pub columns: Vec<PreviewColumn>,
    pub rows: Vec<Vec<String>>,
    pub total_rows: usize,
}

// ==========================================
// ImportOrchestrator - 导入编排器
// ==========================================

pub struct ImportOrchestrator<I>
where
    I: RecordImporter,
{
    schema: FieldSchema,
    importer: Arc<I>,
    settings: ImportSettings,
    publisher: SharedEventPublisher,
    parser: CsvParser,
    mapper: ColumnMapper,
    transformer: RowTransformer,
    reporter: ResultReporter,
    state: SessionState,
}

impl<I> ImportOrchestrator<I>
where
    I: RecordImporter,
{
    /// 创建编排器（不发布事件）
    ///
    /// # 参数
    /// - schema: 导入目标字段定义
    /// - importer: 外部存储导入调用
    /// - settings: 超时、批次、展示上限等配置
    pub fn new(schema: FieldSchema, importer: Arc<I>, settings: ImportSettings) -> Self {
        Self {
            schema,
            importer,
            reporter: ResultReporter::new(settings.error_display_limit),
            settings,
            publisher: Arc::new(NoOpEventPublisher),
            parser: CsvParser,
            mapper: ColumnMapper,
            transformer: RowTransformer,
            state: SessionState::Upload,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn ImportEventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    // ==========================================
    // 只读访问
    // ==========================================

    pub fn step(&self) -> ImportStep {
        self.state.step()
    }

    pub fn schema(&self) -> &FieldSchema {
        &self.schema
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn file_info(&self) -> Option<&FileInfo> {
        match &self.state {
            SessionState::Upload => None,
            SessionState::Mapping(staged) | SessionState::Preview(staged) => Some(&staged.info),
            SessionState::Importing { info, .. } => Some(info),
            SessionState::Done(done) => Some(&done.info),
        }
    }

    fn staged(&self) -> Option<&StagedFile> {
        match &self.state {
            SessionState::Mapping(staged) | SessionState::Preview(staged) => Some(staged),
            _ => None,
        }
    }

    pub fn headers(&self) -> &[String] {
        self.staged()
            .map(|s| s.parsed.headers.as_slice())
            .unwrap_or(&[])
    }

    pub fn row_count(&self) -> usize {
        self.staged().map(|s| s.parsed.rows.len()).unwrap_or(0)
    }

    pub fn mappings(&self) -> Option<&ColumnMappings> {
        self.staged().map(|s| &s.mappings)
    }

    /// 映射界面展示用: 该列首行的值（截断）
    pub fn sample_value(&self, csv_column: &str) -> Option<String> {
        self.staged()?
            .parsed
            .rows
            .first()?
            .get(csv_column)
            .map(|v| truncate_chars(v, PREVIEW_CELL_MAX_CHARS))
    }

    /// 尚未映射的必填字段 label
    pub fn missing_required(&self) -> Vec<String> {
        match self.mappings() {
            Some(mappings) => self
                .mapper
                .missing_required(mappings, &self.schema)
                .into_iter()
                .map(|f| f.label.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn completed(&self) -> Option<&CompletedImport> {
        match &self.state {
            SessionState::Done(done) => Some(done),
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&ImportResult> {
        self.completed().map(|d| &d.result)
    }

    pub fn report(&self) -> Option<&ImportReport> {
        self.completed().map(|d| &d.report)
    }

    pub fn reporter(&self) -> &ResultReporter {
        &self.reporter
    }

    // ==========================================
    // 状态迁移
    // ==========================================

    /// 上传文件: 类型检查 → 解析 → 自动映射 → mapping
    ///
    /// 失败时停留在 upload，并发布错误提示
    pub fn load_file(&mut self, file: UploadedFile) -> PipelineResult<()> {
        self.require_step(ImportStep::Upload, "load_file")?;

        let parsed = CsvParser::check_file_type(&file.name, file.mime.as_deref())
            .and_then(|_| self.parser.parse(&file.bytes));

        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                if e.is_input_rejection() {
                    warn!(file = %file.name, error = %e, "文件被拒绝");
                } else {
                    error!(file = %file.name, error = %e, "文件加载异常");
                }
                self.emit(ImportEvent::notice(NoticeLevel::Error, rejection_notice(&e)));
                return Err(e);
            }
        };

        let mappings = self.mapper.auto_map(&parsed.headers, &self.schema);
        let info = file.info();

        info!(
            file = %info.name,
            size_bytes = info.size_bytes,
            headers = parsed.headers.len(),
            rows = parsed.rows.len(),
            auto_mapped = mappings.len(),
            "文件解析完成"
        );

        self.emit(ImportEvent::notice(
            NoticeLevel::Success,
            t_with_args("upload.loaded", &[("rows", &parsed.rows.len().to_string())]),
        ));
        self.transition(SessionState::Mapping(StagedFile {
            info,
            parsed,
            mappings,
        }));
        Ok(())
    }

    /// 人工设置映射
    ///
    /// # 返回
    /// 目标字段原先所在的列（已被移除）
    pub fn set_mapping(&mut self, csv_column: &str, db_field: &str) -> PipelineResult<Option<String>> {
        let step = self.step();
        let staged = match &mut self.state {
            SessionState::Mapping(staged) => staged,
            _ => {
                return Err(ImportError::InvalidTransition {
                    step,
                    action: "set_mapping".to_string(),
                })
            }
        };

        let displaced = self.mapper.set_mapping(
            &mut staged.mappings,
            &staged.parsed.headers,
            &self.schema,
            csv_column,
            db_field,
        )?;

        debug!(csv_column, db_field, displaced = ?displaced, "映射已更新");
        Ok(displaced)
    }

    pub fn remove_mapping(&mut self, csv_column: &str) -> PipelineResult<bool> {
        let step = self.step();
        match &mut self.state {
            SessionState::Mapping(staged) => {
                let removed = self.mapper.remove_mapping(&mut staged.mappings, csv_column);
                debug!(csv_column, removed, "映射已移除");
                Ok(removed)
            }
            _ => Err(ImportError::InvalidTransition {
                step,
                action: "remove_mapping".to_string(),
            }),
        }
    }

    /// mapping → preview（必填字段未映射时阻止并发布警告）
    pub fn proceed_to_preview(&mut self) -> PipelineResult<()> {
        self.require_step(ImportStep::Mapping, "proceed_to_preview")?;

        if let Some(mappings) = self.mappings() {
            if let Err(e) = self.mapper.check_required(mappings, &self.schema) {
                let missing = self.missing_required().join(", ");
                warn!(missing = %missing, "必填字段未映射，无法进入预览");
                self.emit(ImportEvent::notice(
                    NoticeLevel::Warning,
                    t_with_args("mapping.missing_required", &[("fields", &missing)]),
                ));
                return Err(e);
            }
        }

        self.replace_state(|state| match state {
            SessionState::Mapping(staged) => SessionState::Preview(staged),
            other => other,
        });
        Ok(())
    }

    /// preview → mapping
    pub fn back_to_mapping(&mut self) -> PipelineResult<()> {
        self.require_step(ImportStep::Preview, "back_to_mapping")?;
        self.replace_state(|state| match state {
            SessionState::Preview(staged) => SessionState::Mapping(staged),
            other => other,
        });
        Ok(())
    }

    /// 预览表: 映射列 + 前 N 行（单元格截断到 50 字符）
    pub fn preview(&self) -> PipelineResult<PreviewTable> {
        let staged = match &self.state {
            SessionState::Preview(staged) => staged,
            other => {
                return Err(ImportError::InvalidTransition {
                    step: other.step(),
                    action: "preview".to_string(),
                })
            }
        };

        let columns: Vec<PreviewColumn> = staged
            .mappings
            .iter()
            .map(|m| PreviewColumn {
                csv_column: m.csv_column.clone(),
                db_field: m.db_field.clone(),
                label: self
                    .schema
                    .get(&m.db_field)
                    .map(|f| f.display_label())
                    .unwrap_or_else(|| m.db_field.clone()),
            })
            .collect();

        let rows = staged
            .parsed
            .rows
            .iter()
            .take(self.settings.preview_row_limit)
            .map(|row| {
                columns
                    .iter()
                    .map(|c| {
                        row.get(&c.csv_column)
                            .map(|v| truncate_chars(v, PREVIEW_CELL_MAX_CHARS))
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .collect();

        Ok(PreviewTable {
            columns,
            rows,
            total_rows: staged.parsed.rows.len(),
        })
    }

    /// preview → importing → done
    ///
    /// 进度阶段:
    /// 1. 准备 0 → 35%（模拟）
    /// 2. 分批推进 35 → 85%（模拟，每批后固定停顿）
    /// 3. 90%: 发起真实调用，与超时竞争
    /// 4. 100%: 调用结束
    ///
    /// 存储错误、panic、超时都转换为失败结果，只有状态机误用返回 Err
    #[instrument(skip(self), fields(batch_token = tracing::field::Empty))]
    pub async fn handle_import(&mut self) -> PipelineResult<ImportReport> {
        self.require_step(ImportStep::Preview, "handle_import")?;

        let staged = match std::mem::replace(&mut self.state, SessionState::Upload) {
            SessionState::Preview(staged) => staged,
            other => {
                self.state = other;
                return Err(ImportError::InternalError("预览状态丢失".to_string()));
            }
        };

        // 映射在此刻冻结，行只转换这一次
        let rows = self
            .transformer
            .transform(&staged.parsed.rows, &staged.mappings, &self.schema);
        let mappings = staged.mappings.to_vec();
        let total = rows.len();
        let info = staged.info;
        let batch_token = Uuid::new_v4();
        tracing::Span::current().record("batch_token", tracing::field::display(batch_token));

        self.state = SessionState::Importing {
            info: info.clone(),
            total,
        };
        self.emit(ImportEvent::StepChanged {
            from: ImportStep::Preview,
            to: ImportStep::Importing,
        });
        info!(total, file = %info.name, "开始导入");

        let mut tracker = ProgressTracker::new(total);

        // ===== 阶段1: 准备 =====
        for percent in PREPARATION_STEPS {
            let snapshot = tracker.advance(ProgressPhase::Preparing, percent, 0);
            self.emit(ImportEvent::Progress(snapshot));
            self.pause().await;
        }

        // ===== 阶段2: 模拟分批推进 =====
        for step in sweep_plan(total, self.settings.progress_batches) {
            let snapshot = tracker.advance(ProgressPhase::Simulated, step.percent, step.processed);
            debug!(processed = step.processed, percent = step.percent, "模拟批次");
            self.emit(ImportEvent::Progress(snapshot));
            self.pause().await;
        }

        // ===== 阶段3: 真实调用 =====
        let snapshot = tracker.advance(ProgressPhase::AwaitingStore, AWAITING_STORE, total);
        self.emit(ImportEvent::Progress(snapshot));

        let request = ImportRequest {
            batch_token,
            rows,
            mappings,
        };
        let importer = Arc::clone(&self.importer);
        let call = AssertUnwindSafe(importer.import_batch(request)).catch_unwind();

        let mut result = match tokio::time::timeout(self.settings.timeout, call).await {
            Ok(Ok(Ok(result))) => result,
            Ok(Ok(Err(e))) => {
                error!(error = %e, "存储导入失败");
                ImportResult::failure(
                    t("import.failed"),
                    t_with_args("import.store_error", &[("error", &e.to_string())]),
                )
            }
            Ok(Err(panic)) => {
                let detail = panic_message(panic);
                error!(panic = %detail, "存储导入异常终止");
                ImportResult::failure(
                    t("import.failed"),
                    t_with_args("import.unexpected_error", &[("error", &detail)]),
                )
            }
            Err(_) => {
                let secs = self.settings.timeout.as_secs_f64();
                error!(timeout_secs = secs, "存储导入超时，放弃等待");
                ImportResult::failure(
                    t("import.failed"),
                    t_with_args("import.timeout", &[("secs", &format!("{:.0}", secs))]),
                )
            }
        };

        if result.imported > total {
            warn!(
                reported = result.imported,
                total, "存储返回的导入数超过总行数，已截断"
            );
            result.imported = total;
        }

        // ===== 阶段4: 落定 =====
        let snapshot = tracker.settle(total);
        self.emit(ImportEvent::Progress(snapshot));

        let report = self.reporter.report(&result, total, tracker.elapsed());
        let level = if !report.is_success() {
            NoticeLevel::Error
        } else if report.error_count > 0 {
            NoticeLevel::Warning
        } else {
            NoticeLevel::Success
        };
        self.emit(ImportEvent::notice(level, self.reporter.headline(report.outcome)));

        info!(
            success = result.success,
            imported = result.imported,
            errors = result.errors.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "导入结束"
        );

        self.transition(SessionState::Done(CompletedImport {
            info,
            batch_token,
            result,
            report: report.clone(),
        }));
        Ok(report)
    }

    /// 任意步骤 → upload，丢弃整个会话
    pub fn reset(&mut self) {
        debug!(from = %self.step(), "会话重置");
        self.transition(SessionState::Upload);
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn require_step(&self, expected: ImportStep, action: &str) -> PipelineResult<()> {
        let step = self.step();
        if step == expected {
            Ok(())
        } else {
            Err(ImportError::InvalidTransition {
                step,
                action: action.to_string(),
            })
        }
    }

    fn transition(&mut self, next: SessionState) {
        let from = self.step();
        self.state = next;
        let to = self.step();
        self.emit(ImportEvent::StepChanged { from, to });
    }

    fn replace_state<F>(&mut self, f: F)
    where
        F: FnOnce(SessionState) -> SessionState,
    {
        let current = std::mem::replace(&mut self.state, SessionState::Upload);
        self.transition(f(current));
    }

    fn emit(&self, event: ImportEvent) {
        if let Err(e) = self.publisher.publish(event) {
            warn!(error = %e, "事件发布失败");
        }
    }

    async fn pause(&self) {
        if !self.settings.batch_pause.is_zero() {
            tokio::time::sleep(self.settings.batch_pause).await;
        }
    }
}

/// 输入拒绝 → 操作员提示
fn rejection_notice(err: &ImportError) -> String {
    match err {
        ImportError::UnsupportedFormat(format) => {
            t_with_args("upload.invalid_format", &[("format", format)])
        }
        ImportError::EmptyFile => t("upload.empty_file"),
        ImportError::NoHeaders => t("upload.no_headers"),
        ImportError::CsvParseError(detail) | ImportError::FileReadError(detail) => {
            t_with_args("upload.parse_error", &[("detail", detail)])
        }
        other => t_with_args("upload.parse_error", &[("detail", &other.to_string())]),
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}
