// ==========================================
// 供应链跟踪系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::analytics_config_trait::AnalyticsConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::SharedPartMerge;
use crate::repository::analytics_refresh_repo::{DEFAULT_LOG_RETENTION_DAYS, MAX_LOG_RETENTION_DAYS};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// 支持的界面语言
pub const SUPPORTED_LOCALES: [&str; 2] = ["zh-CN", "en"];
pub const DEFAULT_LOCALE: &str = "zh-CN";

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：会对传入连接再次应用统一 PRAGMA（幂等），并确保 config_kv 存在。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            conn_guard.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS config_kv (
                  scope_id TEXT NOT NULL DEFAULT 'global',
                  key TEXT NOT NULL,
                  value TEXT NOT NULL,
                  updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                  PRIMARY KEY (scope_id, key)
                );
                "#,
            )?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入 global scope 配置（校验已知键的取值）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() {
            return Err("配置键不能为空".into());
        }
        validate_value(key, value)?;

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;

        tracing::info!(key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 刷新日志保留天数（无效值回退默认值）
    ///
    /// 在装配刷新服务时同步读取，修改后下次启动生效
    pub fn refresh_log_retention_days(&self) -> ConfigResult<i64> {
        let default = DEFAULT_LOG_RETENTION_DAYS.to_string();
        let value = self.get_config_or_default(config_keys::REFRESH_LOG_RETENTION_DAYS, &default)?;
        Ok(parse_retention_days(&value).unwrap_or_else(|| {
            tracing::warn!(config_key = config_keys::REFRESH_LOG_RETENTION_DAYS, value = %value, "配置值无效，使用默认值 {}", DEFAULT_LOG_RETENTION_DAYS);
            DEFAULT_LOG_RETENTION_DAYS
        }))
    }

    /// 获取所有配置的快照（JSON格式，按键排序）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;
        let config_map = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(serde_json::to_string(&json!(config_map))?)
    }
}

/// 已知键的取值校验，未知键不校验
fn validate_value(key: &str, value: &str) -> ConfigResult<()> {
    match key {
        config_keys::REFRESH_BEFORE_READ => {
            parse_bool(value).ok_or_else(|| format!("{} 需为 true/false: {}", key, value))?;
        }
        config_keys::SHARED_PART_MERGE => {
            SharedPartMerge::parse(value)
                .ok_or_else(|| format!("{} 需为 FIRST_WINS/MAX: {}", key, value))?;
        }
        config_keys::REFRESH_LOG_RETENTION_DAYS => {
            parse_retention_days(value)
                .ok_or_else(|| format!("{} 需为 1..={} 的整数: {}", key, MAX_LOG_RETENTION_DAYS, value))?;
        }
        config_keys::UI_LOCALE => {
            if !SUPPORTED_LOCALES.contains(&value) {
                return Err(format!("不支持的语言: {}", value).into());
            }
        }
        _ => {}
    }
    Ok(())
}

fn parse_retention_days(value: &str) -> Option<i64> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|days| (1..=MAX_LOG_RETENTION_DAYS).contains(days))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[async_trait]
impl AnalyticsConfigReader for ConfigManager {
    async fn get_refresh_before_read(&self) -> ConfigResult<bool> {
        let value = self.get_config_or_default(config_keys::REFRESH_BEFORE_READ, "true")?;
        Ok(parse_bool(&value).unwrap_or_else(|| {
            tracing::warn!(config_key = config_keys::REFRESH_BEFORE_READ, value = %value, "配置值无效，使用默认值 true");
            true
        }))
    }

    async fn get_shared_part_merge(&self) -> ConfigResult<SharedPartMerge> {
        let value = self.get_config_or_default(config_keys::SHARED_PART_MERGE, "FIRST_WINS")?;
        Ok(SharedPartMerge::parse(&value).unwrap_or_else(|| {
            tracing::warn!(config_key = config_keys::SHARED_PART_MERGE, value = %value, "配置值无效，使用默认值 FIRST_WINS");
            SharedPartMerge::default()
        }))
    }

    async fn get_locale(&self) -> ConfigResult<String> {
        let value = self.get_config_or_default(config_keys::UI_LOCALE, DEFAULT_LOCALE)?;
        if SUPPORTED_LOCALES.contains(&value.as_str()) {
            Ok(value)
        } else {
            Ok(DEFAULT_LOCALE.to_string())
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 分析视图
    pub const REFRESH_BEFORE_READ: &str = "analytics.refresh_before_read";
    pub const SHARED_PART_MERGE: &str = "analytics.shared_part_merge";
    pub const REFRESH_LOG_RETENTION_DAYS: &str = "analytics.refresh_log_retention_days";

    // 界面
    pub const UI_LOCALE: &str = "ui.locale";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory_shared;

    fn manager() -> ConfigManager {
        ConfigManager::from_connection(open_in_memory_shared().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_defaults() {
        let config = manager();
        assert!(config.get_refresh_before_read().await.unwrap());
        assert_eq!(config.get_shared_part_merge().await.unwrap(), SharedPartMerge::FirstWins);
        assert_eq!(config.get_locale().await.unwrap(), "zh-CN");
        assert_eq!(config.refresh_log_retention_days().unwrap(), DEFAULT_LOG_RETENTION_DAYS);
    }

    #[test]
    fn test_refresh_log_retention_days() {
        let config = manager();
        config
            .set_global_config_value(config_keys::REFRESH_LOG_RETENTION_DAYS, "7")
            .unwrap();
        assert_eq!(config.refresh_log_retention_days().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_set_and_read_back() {
        let config = manager();
        config.set_global_config_value(config_keys::REFRESH_BEFORE_READ, "false").unwrap();
        config.set_global_config_value(config_keys::SHARED_PART_MERGE, "MAX").unwrap();
        config.set_global_config_value(config_keys::UI_LOCALE, "en").unwrap();

        assert!(!config.get_refresh_before_read().await.unwrap());
        assert_eq!(config.get_shared_part_merge().await.unwrap(), SharedPartMerge::Max);
        assert_eq!(config.get_locale().await.unwrap(), "en");

        let snapshot: BTreeMap<String, String> =
            serde_json::from_str(&config.get_config_snapshot().unwrap()).unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get(config_keys::UI_LOCALE).map(String::as_str), Some("en"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = manager();
        assert!(config.set_global_config_value(config_keys::SHARED_PART_MERGE, "AVERAGE").is_err());
        assert!(config.set_global_config_value(config_keys::UI_LOCALE, "fr").is_err());
        assert!(config.set_global_config_value(config_keys::REFRESH_BEFORE_READ, "maybe").is_err());
        assert!(config.set_global_config_value(config_keys::REFRESH_LOG_RETENTION_DAYS, "0").is_err());
        assert!(config.set_global_config_value(config_keys::REFRESH_LOG_RETENTION_DAYS, "abc").is_err());
        assert!(config.set_global_config_value("", "x").is_err());
        assert!(config.set_global_config_value("custom.note", "anything").is_ok());
    }
}
