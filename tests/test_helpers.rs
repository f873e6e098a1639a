// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、测试目标定义、事件记录器、模拟存储
// ==========================================

#![allow(dead_code)]

use async_trait::async_trait;
use backoffice_csv_import::config::ImportSettings;
use backoffice_csv_import::db::{init_schema, open_sqlite_connection};
use backoffice_csv_import::domain::{
    FieldDescriptor, FieldSchema, FieldType, ImportRequest, ImportResult, ImportTarget,
    UploadedFile,
};
use backoffice_csv_import::engine::{ImportEvent, ImportEventPublisher, ProgressSnapshot};
use backoffice_csv_import::importer::{ImportError, PipelineResult, RecordImporter};
use rusqlite::Connection;
use serde_json::json;
use std::error::Error;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径非 UTF-8")?
        .to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开测试数据库连接
pub fn open_test_connection(db_path: &str) -> Result<Connection, Box<dyn Error>> {
    Ok(open_sqlite_connection(db_path)?)
}

/// 插入全局配置
pub fn insert_test_config(conn: &Connection, entries: &[(&str, &str)]) -> Result<(), Box<dyn Error>> {
    for (key, value) in entries {
        conn.execute(
            "INSERT OR REPLACE INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)",
            rusqlite::params![key, value],
        )?;
    }
    Ok(())
}

/// 测试目标: 产品（nome/preco 必填，nome 判重）
pub fn produtos_target() -> ImportTarget {
    ImportTarget {
        entity: "produtos".to_string(),
        unique_key: Some("nome".to_string()),
        fields: FieldSchema::new(vec![
            FieldDescriptor::new("nome", "Nome do Produto", true, FieldType::String),
            FieldDescriptor::new("preco", "Preço", true, FieldType::Number),
            FieldDescriptor::new("ativo", "Ativo", false, FieldType::Boolean),
            FieldDescriptor::new("cadastro", "Data de Cadastro", false, FieldType::Date),
        ])
        .expect("schema de teste inválido"),
        sample_data: vec![
            json!({
                "nome": "Camiseta Básica, Algodão",
                "preco": 49.9,
                "ativo": true,
                "cadastro": "2025-01-20"
            })
            .as_object()
            .cloned()
            .unwrap_or_default(),
            json!({
                "nome": "Boné \"Aba Reta\"",
                "preco": 35,
                "ativo": false,
                "cadastro": "2025-02-03"
            })
            .as_object()
            .cloned()
            .unwrap_or_default(),
        ],
    }
}

/// 测试配置: 无停顿
pub fn fast_settings() -> ImportSettings {
    ImportSettings {
        batch_pause: Duration::ZERO,
        ..ImportSettings::default()
    }
}

pub fn csv_file(name: &str, content: &str) -> UploadedFile {
    UploadedFile::new(name, Some("text/csv"), content.as_bytes().to_vec())
}

// ==========================================
// 事件记录器
// ==========================================
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<ImportEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<ImportEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn progress(&self) -> Vec<ProgressSnapshot> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ImportEvent::Progress(snapshot) => Some(snapshot),
                _ => None,
            })
            .collect()
    }
}

impl ImportEventPublisher for RecordingPublisher {
    fn publish(&self, event: ImportEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.events
            .lock()
            .map_err(|e| e.to_string())?
            .push(event);
        Ok(())
    }
}

// ==========================================
// 模拟存储
// ==========================================

/// 超过超时时间才返回
pub struct SlowImporter {
    pub delay: Duration,
}

#[async_trait]
impl RecordImporter for SlowImporter {
    async fn import_batch(&self, request: ImportRequest) -> PipelineResult<ImportResult> {
        tokio::time::sleep(self.delay).await;
        Ok(ImportResult {
            success: true,
            message: "tarde demais".to_string(),
            imported: request.rows.len(),
            errors: vec![],
        })
    }
}

/// 调用即 panic
pub struct PanickingImporter;

#[async_trait]
impl RecordImporter for PanickingImporter {
    async fn import_batch(&self, _request: ImportRequest) -> PipelineResult<ImportResult> {
        panic!("conexão perdida");
    }
}

/// 返回存储错误
pub struct FailingImporter;

#[async_trait]
impl RecordImporter for FailingImporter {
    async fn import_batch(&self, _request: ImportRequest) -> PipelineResult<ImportResult> {
        Err(ImportError::Store("servidor indisponível".to_string()))
    }
}
