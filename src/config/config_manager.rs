// ==========================================
// 后台导入系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 覆写: 实体作用域 > 全局作用域 > 代码默认值
// ==========================================

use crate::config::import_config_trait::ImportConfigReader;
use crate::db::open_sqlite_connection;
use crate::importer::{ImportError, PipelineResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigScope - 配置作用域
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigScope {
    Global,                    // 全局
    Entity { entity: String }, // 导入目标实体（如 clientes）
}

impl ConfigScope {
    pub fn scope_id(&self) -> String {
        match self {
            ConfigScope::Global => "global".to_string(),
            ConfigScope::Entity { entity } => format!("entity/{}", entity),
        }
    }

    fn scope_type(&self) -> &'static str {
        match self {
            ConfigScope::Global => "GLOBAL",
            ConfigScope::Entity { .. } => "ENTITY",
        }
    }

    fn scope_key(&self) -> &str {
        match self {
            ConfigScope::Global => "global",
            ConfigScope::Entity { entity } => entity,
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
    scope: ConfigScope,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例（全局作用域）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> PipelineResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            scope: ConfigScope::Global,
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> PipelineResult<Self> {
        {
            let conn_guard = lock(&conn)?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self {
            conn,
            scope: ConfigScope::Global,
        })
    }

    /// 切换读取作用域（实体作用域未配置的键回落到全局）
    pub fn with_scope(mut self, scope: ConfigScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn scope(&self) -> &ConfigScope {
        &self.scope
    }

    /// 读取指定作用域的配置值
    fn get_scoped_value(&self, scope_id: &str, key: &str) -> PipelineResult<Option<String>> {
        let conn = lock(&self.conn)?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![scope_id, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 按覆写顺序读取配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    fn get_config_value(&self, key: &str) -> PipelineResult<Option<String>> {
        if self.scope != ConfigScope::Global {
            if let Some(value) = self.get_scoped_value(&self.scope.scope_id(), key)? {
                return Ok(Some(value));
            }
        }
        self.get_scoped_value("global", key)
    }

    /// 写入配置值（作用域不存在时自动创建）
    pub fn set_config_value(&self, scope: &ConfigScope, key: &str, value: &str) -> PipelineResult<()> {
        let conn = lock(&self.conn)?;
        let scope_id = scope.scope_id();

        conn.execute(
            "INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key) VALUES (?1, ?2, ?3)",
            params![scope_id, scope.scope_type(), scope.scope_key()],
        )?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![scope_id, key, value],
        )?;

        tracing::debug!(scope = %scope_id, key, value, "配置已写入");
        Ok(())
    }

    /// 读取并解析配置值，缺失时使用默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> PipelineResult<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_config_value(key)? {
            None => Ok(default),
            Some(raw) => raw.trim().parse::<T>().map_err(|e| ImportError::ConfigValueError {
                key: key.to_string(),
                value: raw.clone(),
                message: e.to_string(),
            }),
        }
    }

    /// 读取正整数配置（0 视为非法）
    fn get_positive_or_default<T>(&self, key: &str, default: T) -> PipelineResult<T>
    where
        T: FromStr + PartialEq + Default + Copy + std::fmt::Display,
        T::Err: std::fmt::Display,
    {
        let value = self.get_parsed_or_default(key, default)?;
        if value == T::default() {
            return Err(ImportError::ConfigValueError {
                key: key.to_string(),
                value: value.to_string(),
                message: "必须大于 0".to_string(),
            });
        }
        Ok(value)
    }

    /// 获取当前作用域生效配置的快照（JSON格式）
    ///
    /// # 用途
    /// - 随批次写入 import_batch.config_snapshot_json（见 SqliteRecordStore::with_config_snapshot）
    pub fn get_config_snapshot(&self) -> PipelineResult<String> {
        let conn = lock(&self.conn)?;

        let mut stmt = conn.prepare(
            "SELECT scope_id, key, value FROM config_kv WHERE scope_id IN ('global', ?1) ORDER BY key",
        )?;

        let scope_id = self.scope.scope_id();
        let rows = stmt.query_map(params![scope_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        // 实体作用域覆盖全局
        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let mut scoped: Vec<(String, String)> = Vec::new();
        for row in rows {
            let (row_scope, key, value) = row?;
            if row_scope == "global" {
                config_map.insert(key, value);
            } else {
                scoped.push((key, value));
            }
        }
        config_map.extend(scoped);

        Ok(serde_json::to_string(&json!(config_map)).map_err(anyhow::Error::from)?)
    }
}

fn lock(conn: &Arc<Mutex<Connection>>) -> PipelineResult<std::sync::MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| ImportError::InternalError(format!("锁获取失败: {}", e)))
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    // ===== 导入调用 =====

    async fn get_import_timeout_ms(&self) -> PipelineResult<u64> {
        self.get_positive_or_default(config_keys::IMPORT_TIMEOUT_MS, defaults::IMPORT_TIMEOUT_MS)
    }

    // ===== 进度展示 =====

    async fn get_progress_batches(&self) -> PipelineResult<usize> {
        self.get_positive_or_default(config_keys::PROGRESS_BATCHES, defaults::PROGRESS_BATCHES)
    }

    async fn get_batch_pause_ms(&self) -> PipelineResult<u64> {
        // 0 表示不停顿
        self.get_parsed_or_default(config_keys::BATCH_PAUSE_MS, defaults::BATCH_PAUSE_MS)
    }

    // ===== 结果展示 =====

    async fn get_error_display_limit(&self) -> PipelineResult<usize> {
        self.get_positive_or_default(config_keys::ERROR_DISPLAY_LIMIT, defaults::ERROR_DISPLAY_LIMIT)
    }

    async fn get_preview_row_limit(&self) -> PipelineResult<usize> {
        self.get_positive_or_default(config_keys::PREVIEW_ROW_LIMIT, defaults::PREVIEW_ROW_LIMIT)
    }

    async fn get_locale(&self) -> PipelineResult<String> {
        let value = self.get_config_value(config_keys::LOCALE)?;
        match value.as_deref().map(str::trim) {
            None | Some("") => Ok(defaults::LOCALE.to_string()),
            Some(locale) if crate::i18n::is_supported(locale) => Ok(locale.to_string()),
            Some(other) => Err(ImportError::ConfigValueError {
                key: config_keys::LOCALE.to_string(),
                value: other.to_string(),
                message: format!("支持的语言: {}", crate::i18n::SUPPORTED_LOCALES.join(", ")),
            }),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 导入调用
    pub const IMPORT_TIMEOUT_MS: &str = "import/timeout_ms";

    // 进度展示
    pub const PROGRESS_BATCHES: &str = "import/progress_batches";
    pub const BATCH_PAUSE_MS: &str = "import/batch_pause_ms";

    // 结果展示
    pub const ERROR_DISPLAY_LIMIT: &str = "import/error_display_limit";
    pub const PREVIEW_ROW_LIMIT: &str = "import/preview_row_limit";

    // 界面语言
    pub const LOCALE: &str = "import/locale";
}

// ==========================================
// 默认值
// ==========================================
pub mod defaults {
    pub const IMPORT_TIMEOUT_MS: u64 = 6 * 60 * 1000;
    pub const PROGRESS_BATCHES: usize = 20;
    pub const BATCH_PAUSE_MS: u64 = 40;
    pub const ERROR_DISPLAY_LIMIT: usize = 15;
    pub const PREVIEW_ROW_LIMIT: usize = 5;
    pub const LOCALE: &str = "pt-BR";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use tempfile::NamedTempFile;

    fn manager() -> (NamedTempFile, ConfigManager) {
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap().to_string();
        let conn = open_sqlite_connection(&path).unwrap();
        init_schema(&conn).unwrap();
        drop(conn);
        (temp_file, ConfigManager::new(&path).unwrap())
    }

    #[tokio::test]
    async fn test_defaults_when_missing() {
        let (_tmp, config) = manager();
        assert_eq!(config.get_import_timeout_ms().await.unwrap(), 360_000);
        assert_eq!(config.get_progress_batches().await.unwrap(), 20);
        assert_eq!(config.get_error_display_limit().await.unwrap(), 15);
        assert_eq!(config.get_locale().await.unwrap(), "pt-BR");
    }

    #[tokio::test]
    async fn test_entity_scope_overrides_global() {
        let (_tmp, config) = manager();
        let clientes = ConfigScope::Entity {
            entity: "clientes".to_string(),
        };
        config
            .set_config_value(&ConfigScope::Global, config_keys::PROGRESS_BATCHES, "10")
            .unwrap();
        config
            .set_config_value(&clientes, config_keys::PROGRESS_BATCHES, "4")
            .unwrap();

        assert_eq!(config.get_progress_batches().await.unwrap(), 10);

        let scoped = config.with_scope(clientes);
        assert_eq!(scoped.get_progress_batches().await.unwrap(), 4);
        // 实体作用域未配置的键回落到全局默认
        assert_eq!(scoped.get_preview_row_limit().await.unwrap(), 5);

        let snapshot: serde_json::Value =
            serde_json::from_str(&scoped.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot[config_keys::PROGRESS_BATCHES], "4");
    }

    #[tokio::test]
    async fn test_invalid_values_are_rejected() {
        let (_tmp, config) = manager();
        config
            .set_config_value(&ConfigScope::Global, config_keys::IMPORT_TIMEOUT_MS, "seis")
            .unwrap();
        config
            .set_config_value(&ConfigScope::Global, config_keys::PROGRESS_BATCHES, "0")
            .unwrap();
        config
            .set_config_value(&ConfigScope::Global, config_keys::LOCALE, "fr")
            .unwrap();

        assert!(matches!(
            config.get_import_timeout_ms().await,
            Err(ImportError::ConfigValueError { .. })
        ));
        assert!(matches!(
            config.get_progress_batches().await,
            Err(ImportError::ConfigValueError { .. })
        ));
        assert!(matches!(
            config.get_locale().await,
            Err(ImportError::ConfigValueError { .. })
        ));
    }
}
