// ==========================================
// 后台导入系统 - 命令行入口
// ==========================================
// 用法:
//   backoffice-csv-import <target.json> <file.csv> [db_path]
//   backoffice-csv-import --sample <target.json> [out_dir]
//
// 无界面运行完整流水线: 解析 → 自动映射 → 预览 → 导入 → 报告
// 自动映射未覆盖必填字段时直接退出（命令行无法人工补充映射）
// ==========================================

use anyhow::{bail, Context};
use backoffice_csv_import::config::{ConfigManager, ConfigScope, ImportSettings};
use backoffice_csv_import::db::{get_default_db_path, init_schema, open_sqlite_connection};
use backoffice_csv_import::engine::{ChannelEventPublisher, ImportEvent, ImportOrchestrator};
use backoffice_csv_import::{i18n, logging, ImportTarget, SampleExporter, SqliteRecordStore, UploadedFile};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const USAGE: &str = "usage:
  backoffice-csv-import <target.json> <file.csv> [db_path]
  backoffice-csv-import --sample <target.json> [out_dir]";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("--sample") if args.len() >= 2 => write_sample(&args[1], args.get(2)),
        Some(_) if args.len() >= 2 => run_import(&args[0], &args[1], args.get(2)).await,
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

fn load_target(path: &str) -> anyhow::Result<ImportTarget> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("无法读取目标定义: {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("目标定义格式错误: {}", path))
}

/// 生成示例 CSV
fn write_sample(target_path: &str, out_dir: Option<&String>) -> anyhow::Result<()> {
    let target = load_target(target_path)?;
    let exporter = SampleExporter;

    let dir = out_dir.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    let out = dir.join(exporter.file_name(&target.entity));
    let content = exporter.render(&target.fields, &target.sample_data)?;

    std::fs::write(&out, content).with_context(|| format!("无法写入: {}", out.display()))?;
    println!("{}", out.display());
    Ok(())
}

/// 运行完整导入
async fn run_import(target_path: &str, csv_path: &str, db_path: Option<&String>) -> anyhow::Result<()> {
    let target = load_target(target_path)?;
    let db_path = db_path.cloned().unwrap_or_else(get_default_db_path);

    tracing::info!(version = backoffice_csv_import::VERSION, db = %db_path, entity = %target.entity, "启动导入");

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;
    let conn = Arc::new(Mutex::new(conn));

    let config = ConfigManager::from_connection(conn.clone())?.with_scope(ConfigScope::Entity {
        entity: target.entity.clone(),
    });
    let settings = ImportSettings::load(&config).await?;
    i18n::set_locale(&settings.locale);

    let snapshot = config.get_config_snapshot()?;
    let store = Arc::new(
        SqliteRecordStore::from_connection(conn, target.clone())?.with_config_snapshot(snapshot),
    );

    // 事件输出到 stderr，报告输出到 stdout
    let (publisher, mut events) = ChannelEventPublisher::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ImportEvent::Notice { level, message } => {
                    eprintln!("[{}] {}", level.as_str(), message);
                }
                ImportEvent::Progress(snapshot) => {
                    let tag = if snapshot.simulated { " (simulado)" } else { "" };
                    eprintln!(
                        "{:>5.1}% {}/{}{}",
                        snapshot.percent, snapshot.processed, snapshot.total, tag
                    );
                }
                ImportEvent::StepChanged { from, to } => {
                    tracing::debug!(%from, %to, "步骤切换");
                }
            }
        }
    });

    let mut orchestrator = ImportOrchestrator::new(target.fields.clone(), store, settings)
        .with_publisher(Arc::new(publisher));

    let bytes = std::fs::read(csv_path).with_context(|| format!("无法读取 CSV: {}", csv_path))?;
    let file_name = Path::new(csv_path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| csv_path.to_string());

    orchestrator.load_file(UploadedFile::new(&file_name, None, bytes))?;

    if let Some(mappings) = orchestrator.mappings() {
        for m in mappings.iter() {
            eprintln!("  {} → {}{}", m.csv_column, m.db_field, if m.required { " *" } else { "" });
        }
    }

    let missing = orchestrator.missing_required();
    if !missing.is_empty() {
        bail!("必填字段未能自动映射: {}", missing.join(", "));
    }
    orchestrator.proceed_to_preview()?;

    let preview = orchestrator.preview()?;
    let header: Vec<&str> = preview.columns.iter().map(|c| c.label.as_str()).collect();
    eprintln!("{}", header.join(" | "));
    for row in &preview.rows {
        eprintln!("{}", row.join(" | "));
    }

    let report = orchestrator.handle_import().await?;
    println!("{}", orchestrator.reporter().render(&report));

    // 释放发布者，等待事件输出完毕
    drop(orchestrator);
    printer.await?;

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
