// ==========================================
// 后台导入系统 - SQLite 参考存储
// ==========================================
// 职责: 实现 RecordImporter，逐行校验并写入 imported_record
// 逐行规则:
// - 必填字段为空 → 错误 "row N: Campo obrigatório 'x' está vazio"
// - 数值字段为 NaN → 错误 "row N: x inválido"
// - 判重字段已存在（库内或本批次前序行）→ 跳过，不计入错误
// 幂等: 同一 batch_token 重复提交时返回已记录的结果，不重复写入
// 红线: 单行失败不影响其他行；整批在一个事务内提交
// ==========================================

use crate::db::{configure_sqlite_connection, init_schema, open_sqlite_connection};
use crate::domain::{FieldValue, ImportRequest, ImportResult, ImportTarget, TransformedRow};
use crate::i18n::t_with_args;
use crate::importer::{ImportError, PipelineResult, RecordImporter};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// 单行处理结果
enum RowOutcome {
    Imported,
    Duplicate(String),
    Rejected(String),
}

// ==========================================
// SqliteRecordStore
// ==========================================
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
    target: Arc<ImportTarget>,
    config_snapshot: Option<String>, // 写入 import_batch 的配置快照
}

impl SqliteRecordStore {
    /// 打开数据库并建表
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    /// - target: 导入目标（实体名、判重字段）
    pub fn new(db_path: &str, target: ImportTarget) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            target: Arc::new(target),
            config_snapshot: None,
        })
    }

    /// 从已有连接创建（与 ConfigManager 共享连接）
    pub fn from_connection(conn: Arc<Mutex<Connection>>, target: ImportTarget) -> RepositoryResult<Self> {
        {
            let guard = lock(&conn)?;
            configure_sqlite_connection(&guard)?;
            init_schema(&guard)?;
        }
        Ok(Self {
            conn,
            target: Arc::new(target),
            config_snapshot: None,
        })
    }

    /// 记录本次会话使用的配置（随批次写入 import_batch）
    pub fn with_config_snapshot(mut self, snapshot: String) -> Self {
        self.config_snapshot = Some(snapshot);
        self
    }

    pub fn target(&self) -> &ImportTarget {
        &self.target
    }

    /// 当前实体已导入的记录数
    pub fn count_records(&self) -> RepositoryResult<usize> {
        let conn = lock(&self.conn)?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM imported_record WHERE entity = ?1",
            params![self.target.entity],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// 当前实体已导入记录的 JSON 内容（按写入顺序）
    pub fn list_payloads(&self) -> RepositoryResult<Vec<Value>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT payload_json FROM imported_record WHERE entity = ?1 ORDER BY rowid",
        )?;
        let rows = stmt.query_map(params![self.target.entity], |row| row.get::<_, String>(0))?;

        let mut payloads = Vec::new();
        for row in rows {
            payloads.push(serde_json::from_str(&row?)?);
        }
        Ok(payloads)
    }

    /// 查询已记录的批次结果
    pub fn find_batch(&self, batch_token: &Uuid) -> RepositoryResult<Option<ImportResult>> {
        let conn = lock(&self.conn)?;
        Self::find_batch_with(&conn, batch_token)
    }

    /// 查询批次写入时记录的配置快照
    pub fn find_batch_config(&self, batch_token: &Uuid) -> RepositoryResult<Option<String>> {
        let conn = lock(&self.conn)?;
        let snapshot: Option<Option<String>> = conn
            .query_row(
                "SELECT config_snapshot_json FROM import_batch WHERE batch_token = ?1",
                params![batch_token.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(snapshot.flatten())
    }

    fn find_batch_with(conn: &Connection, batch_token: &Uuid) -> RepositoryResult<Option<ImportResult>> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT result_json FROM import_batch WHERE batch_token = ?1",
                params![batch_token.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// 同步导入（持锁，事务内完成；在阻塞线程池中执行）
    fn import_sync(
        conn: &Arc<Mutex<Connection>>,
        target: &ImportTarget,
        config_snapshot: Option<&str>,
        request: &ImportRequest,
    ) -> RepositoryResult<ImportResult> {
        let mut conn = lock(conn)?;

        if let Some(stored) = Self::find_batch_with(&conn, &request.batch_token)? {
            info!(
                "{}",
                t_with_args("store.replayed", &[("token", &request.batch_token.to_string())])
            );
            return Ok(stored);
        }

        let tx = conn
            .transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let token = request.batch_token.to_string();
        let now = Utc::now().to_rfc3339();

        // 先登记批次，记录行通过外键引用
        tx.execute(
            r#"
            INSERT INTO import_batch (
                batch_token, entity, total_rows, imported, error_count, result_json,
                config_snapshot_json, created_at
            ) VALUES (?1, ?2, ?3, 0, 0, '{}', ?4, ?5)
            "#,
            params![token, target.entity, request.rows.len() as i64, config_snapshot, now],
        )?;

        let required: Vec<&str> = request
            .mappings
            .iter()
            .filter(|m| m.required)
            .map(|m| m.db_field.as_str())
            .collect();

        let mut seen_in_batch: HashSet<String> = HashSet::new();
        let mut imported = 0usize;
        let mut duplicates = 0usize;
        let mut errors: Vec<String> = Vec::new();

        for row in &request.rows {
            match Self::import_row(&tx, target, &token, &now, row, &required, &mut seen_in_batch) {
                Ok(RowOutcome::Imported) => imported += 1,
                Ok(RowOutcome::Duplicate(value)) => {
                    duplicates += 1;
                    debug!(row = row.row_number, unique_value = %value, "重复记录，跳过");
                }
                Ok(RowOutcome::Rejected(message)) => errors.push(message),
                Err(e) => errors.push(format!("row {}: {}", row.row_number, e)),
            }
        }

        let result = Self::compose_result(target, imported, duplicates, errors);

        tx.execute(
            r#"
            UPDATE import_batch
            SET imported = ?2, error_count = ?3, result_json = ?4
            WHERE batch_token = ?1
            "#,
            params![
                token,
                result.imported as i64,
                result.errors.len() as i64,
                serde_json::to_string(&result)?
            ],
        )?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        Ok(result)
    }

    /// 校验并写入单行
    fn import_row(
        tx: &Transaction,
        target: &ImportTarget,
        token: &str,
        now: &str,
        row: &TransformedRow,
        required: &[&str],
        seen_in_batch: &mut HashSet<String>,
    ) -> RepositoryResult<RowOutcome> {
        // 必填字段
        for field in required {
            let blank = row.get(field).map(|v| v.is_blank()).unwrap_or(true);
            if blank {
                return Ok(RowOutcome::Rejected(format!(
                    "row {}: Campo obrigatório '{}' está vazio",
                    row.row_number, field
                )));
            }
        }

        // 数值字段
        let mut payload = Map::new();
        for (field, value) in &row.values {
            match value.to_json() {
                Some(json) => {
                    payload.insert(field.clone(), json);
                }
                None => {
                    return Ok(RowOutcome::Rejected(format!(
                        "row {}: {} inválido",
                        row.row_number, field
                    )));
                }
            }
        }

        // 判重
        let unique_value = target
            .unique_key
            .as_deref()
            .and_then(|key| row.get(key))
            .and_then(unique_text);

        if let Some(value) = &unique_value {
            let exists: bool = tx
                .query_row(
                    "SELECT 1 FROM imported_record WHERE entity = ?1 AND unique_value = ?2 LIMIT 1",
                    params![target.entity, value],
                    |_row| Ok(true),
                )
                .optional()?
                .unwrap_or(false);

            if exists || !seen_in_batch.insert(value.clone()) {
                return Ok(RowOutcome::Duplicate(value.clone()));
            }
        }

        tx.execute(
            r#"
            INSERT INTO imported_record (
                record_id, entity, unique_value, batch_token, row_number, payload_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                Uuid::new_v4().to_string(),
                target.entity,
                unique_value,
                token,
                row.row_number as i64,
                Value::Object(payload).to_string(),
                now
            ],
        )?;

        Ok(RowOutcome::Imported)
    }

    /// 汇总消息
    ///
    /// - 全部成功 / 部分成功: success = true
    /// - 全部失败 / 无导入: success = false
    fn compose_result(
        target: &ImportTarget,
        imported: usize,
        duplicates: usize,
        errors: Vec<String>,
    ) -> ImportResult {
        let entity = target.entity.as_str();
        let count = imported.to_string();
        let error_count = errors.len().to_string();

        let (success, mut message) = if imported > 0 && errors.is_empty() {
            (
                true,
                t_with_args("store.all_imported", &[("count", &count), ("entity", entity)]),
            )
        } else if imported > 0 {
            (
                true,
                t_with_args(
                    "store.imported_with_errors",
                    &[("count", &count), ("entity", entity), ("errors", &error_count)],
                ),
            )
        } else if !errors.is_empty() {
            (
                false,
                t_with_args("store.failed_with_errors", &[("errors", &error_count)]),
            )
        } else {
            (false, t_with_args("store.nothing_imported", &[("entity", entity)]))
        };

        if duplicates > 0 {
            message = format!(
                "{} {}",
                message,
                t_with_args("store.duplicates_skipped", &[("count", &duplicates.to_string())])
            );
        }

        ImportResult {
            success,
            message,
            imported,
            errors,
        }
    }
}

#[async_trait]
impl RecordImporter for SqliteRecordStore {
    #[instrument(skip(self, request), fields(batch_token = %request.batch_token, rows = request.rows.len()))]
    async fn import_batch(&self, request: ImportRequest) -> PipelineResult<ImportResult> {
        let conn = Arc::clone(&self.conn);
        let target = Arc::clone(&self.target);
        let snapshot = self.config_snapshot.clone();

        // rusqlite 调用移出异步执行器，等待期间超时仍可生效
        let result = tokio::task::spawn_blocking(move || {
            Self::import_sync(&conn, &target, snapshot.as_deref(), &request)
        })
        .await
        .map_err(|e| ImportError::Store(format!("写入任务执行失败: {}", e)))?;

        match &result {
            Ok(r) => info!(
                entity = %self.target.entity,
                success = r.success,
                imported = r.imported,
                errors = r.errors.len(),
                "批次写入完成"
            ),
            Err(e) => warn!(error = %e, "批次写入失败"),
        }

        Ok(result?)
    }
}

fn lock(conn: &Arc<Mutex<Connection>>) -> RepositoryResult<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))
}

/// 判重字段的文本形式（空值不参与判重）
fn unique_text(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Null => None,
        FieldValue::Text(s) if s.trim().is_empty() => None,
        FieldValue::Text(s) => Some(s.trim().to_string()),
        FieldValue::Number(n) if n.is_nan() => None,
        FieldValue::Number(n) => Some(n.to_string()),
        FieldValue::Boolean(b) => Some(b.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnMapping, FieldDescriptor, FieldSchema, FieldType};
    use std::collections::BTreeMap;
    use tempfile::NamedTempFile;

    fn target(unique_key: Option<&str>) -> ImportTarget {
        ImportTarget {
            entity: "produtos".to_string(),
            unique_key: unique_key.map(|k| k.to_string()),
            fields: FieldSchema::new(vec![
                FieldDescriptor::new("nome", "Nome", true, FieldType::String),
                FieldDescriptor::new("preco", "Preco", true, FieldType::Number),
            ])
            .unwrap(),
            sample_data: vec![],
        }
    }

    fn store(unique_key: Option<&str>) -> (NamedTempFile, SqliteRecordStore) {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();
        let store = SqliteRecordStore::new(&path, target(unique_key)).unwrap();
        (temp_file, store)
    }

    fn row(n: usize, nome: FieldValue, preco: FieldValue) -> TransformedRow {
        let mut values = BTreeMap::new();
        values.insert("nome".to_string(), nome);
        values.insert("preco".to_string(), preco);
        TransformedRow {
            row_number: n,
            values,
        }
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    fn request(rows: Vec<TransformedRow>) -> ImportRequest {
        ImportRequest {
            batch_token: Uuid::new_v4(),
            rows,
            mappings: vec![
                ColumnMapping {
                    csv_column: "Nome".to_string(),
                    db_field: "nome".to_string(),
                    required: true,
                },
                ColumnMapping {
                    csv_column: "Preco".to_string(),
                    db_field: "preco".to_string(),
                    required: true,
                },
            ],
        }
    }

    #[tokio::test]
    async fn test_nan_rows_are_rejected_individually() {
        let (_tmp, store) = store(None);
        let result = store
            .import_batch(request(vec![
                row(1, text("A"), FieldValue::Number(10.5)),
                row(2, text("B"), FieldValue::Number(f64::NAN)),
                row(3, text("C"), FieldValue::Number(7.0)),
            ]))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.imported, 2);
        assert_eq!(result.errors, vec!["row 2: preco inválido".to_string()]);
        assert_eq!(store.count_records().unwrap(), 2);

        let payloads = store.list_payloads().unwrap();
        assert_eq!(payloads[0]["nome"], "A");
        assert_eq!(payloads[0]["preco"], 10.5);
    }

    #[tokio::test]
    async fn test_required_blank_rows_are_rejected() {
        let (_tmp, store) = store(None);
        let result = store
            .import_batch(request(vec![
                row(1, text("  "), FieldValue::Number(1.0)),
                row(2, text("B"), FieldValue::Null),
            ]))
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.imported, 0);
        assert_eq!(
            result.errors,
            vec![
                "row 1: Campo obrigatório 'nome' está vazio".to_string(),
                "row 2: Campo obrigatório 'preco' está vazio".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_duplicates_skipped_without_errors() {
        let (_tmp, store) = store(Some("nome"));
        store
            .import_batch(request(vec![row(1, text("A"), FieldValue::Number(1.0))]))
            .await
            .unwrap();

        let result = store
            .import_batch(request(vec![
                row(1, text("A"), FieldValue::Number(2.0)),
                row(2, text("B"), FieldValue::Number(3.0)),
                row(3, text("B"), FieldValue::Number(4.0)),
            ]))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.imported, 1);
        assert!(result.errors.is_empty());
        assert_eq!(store.count_records().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_reports_nothing_imported() {
        let (_tmp, store) = store(None);
        let result = store.import_batch(request(vec![])).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.imported, 0);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_batch_token_is_replayed() {
        let (_tmp, store) = store(None);
        let req = request(vec![row(1, text("A"), FieldValue::Number(1.0))]);

        let first = store.import_batch(req.clone()).await.unwrap();
        let second = store.import_batch(req.clone()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.count_records().unwrap(), 1);
        assert_eq!(store.find_batch(&req.batch_token).unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_config_snapshot_recorded_with_batch() {
        let (_tmp, store) = store(None);
        let store = store.with_config_snapshot(r#"{"import/timeout_ms":"1500"}"#.to_string());
        let req = request(vec![row(1, text("A"), FieldValue::Number(1.0))]);

        store.import_batch(req.clone()).await.unwrap();

        let snapshot = store.find_batch_config(&req.batch_token).unwrap().unwrap();
        let value: Value = serde_json::from_str(&snapshot).unwrap();
        assert_eq!(value["import/timeout_ms"], "1500");
        assert_eq!(store.find_batch_config(&Uuid::new_v4()).unwrap(), None);
    }
}
