// ==========================================
// 轨道测量任务管理 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::mission_config_trait::MissionConfigReader;
use crate::db::open_sqlite_connection;
use crate::domain::types::WeekAlignment;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

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
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
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
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值 (UPSERT)
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt = conn.prepare(
            "SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key"
        )?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        let json_value = json!(config_map);
        Ok(serde_json::to_string(&json_value)?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 注意
    /// - 此方法会覆盖现有的global配置
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> Result<usize, Box<dyn Error>> {
        let config_map: HashMap<String, String> = serde_json::from_str(snapshot_json)?;

        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.unchecked_transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            let affected = tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
            count += affected;
        }

        tx.commit()?;
        Ok(count)
    }
}

// ==========================================
// MissionConfigReader Trait 实现
// ==========================================
impl MissionConfigReader for ConfigManager {
    fn get_week_alignment(&self) -> Result<WeekAlignment, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::WEEK_ALIGNMENT, "SNAP")?;
        Ok(WeekAlignment::from_str(&value))
    }

    fn get_auto_start_measure(&self) -> Result<bool, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::AUTO_START_MEASURE, "true")?;
        match value.trim().to_lowercase().as_str() {
            "false" | "0" | "no" => Ok(false),
            _ => Ok(true),
        }
    }

    fn get_reference_prefix(&self) -> Result<String, Box<dyn Error>> {
        self.get_config_or_default(config_keys::REFERENCE_PREFIX, "MES/")
    }

    fn get_default_locale(&self) -> Result<String, Box<dyn Error>> {
        let value = self.get_config_or_default(config_keys::DEFAULT_LOCALE, "zh-CN")?;
        match value.as_str() {
            "zh-CN" | "fr" | "en" => Ok(value),
            other => {
                tracing::warn!(config_key = config_keys::DEFAULT_LOCALE, raw_value = %other, "不支持的语言，使用 zh-CN");
                Ok("zh-CN".to_string())
            }
        }
    }
}

/// 默认数据库路径: <数据目录>/rail-measurement/rail_measurement.db
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rail-measurement")
        .join("rail_measurement.db")
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 周计划
    pub const WEEK_ALIGNMENT: &str = "week_alignment";

    // 生命周期
    pub const AUTO_START_MEASURE: &str = "auto_start_measure";

    // 编号
    pub const REFERENCE_PREFIX: &str = "reference_prefix";

    // 国际化
    pub const DEFAULT_LOCALE: &str = "default_locale";
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MissionConfig;

    fn manager() -> ConfigManager {
        let conn = crate::db::open_in_memory().unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_table_empty() {
        let cm = manager();
        let cfg = MissionConfig::load(&cm).unwrap();
        assert_eq!(cfg, MissionConfig::default());
    }

    #[test]
    fn test_overrides_and_snapshot_roundtrip() {
        let cm = manager();
        cm.set_global_config_value(config_keys::WEEK_ALIGNMENT, "STRICT").unwrap();
        cm.set_global_config_value(config_keys::AUTO_START_MEASURE, "false").unwrap();
        let cfg = MissionConfig::load(&cm).unwrap();
        assert_eq!(cfg.week_alignment, WeekAlignment::Strict);
        assert!(!cfg.auto_start_measure);

        let snapshot = cm.get_config_snapshot().unwrap();
        cm.set_global_config_value(config_keys::WEEK_ALIGNMENT, "SNAP").unwrap();
        assert_eq!(cm.restore_config_from_snapshot(&snapshot).unwrap(), 2);
        assert_eq!(cm.get_week_alignment().unwrap(), WeekAlignment::Strict);
    }

    #[test]
    fn test_unknown_locale_falls_back() {
        let cm = manager();
        cm.set_global_config_value(config_keys::DEFAULT_LOCALE, "de").unwrap();
        assert_eq!(cm.get_default_locale().unwrap(), "zh-CN");
    }
}
