// ==========================================
// 学年升级批处理 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// 覆写: tenant/{tenant_id} > global > 代码默认值
// ==========================================

use crate::config::promotion_settings::PromotionSettings;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigScope - 配置作用域
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigScope {
    Global,                       // 全局
    Tenant { tenant_id: String }, // 租户
}

impl ConfigScope {
    pub fn tenant(tenant_id: &str) -> Self {
        ConfigScope::Tenant {
            tenant_id: tenant_id.to_string(),
        }
    }

    /// config_scope.scope_id
    pub fn scope_id(&self) -> String {
        match self {
            ConfigScope::Global => "global".to_string(),
            ConfigScope::Tenant { tenant_id } => format!("tenant/{}", tenant_id),
        }
    }

    fn scope_type(&self) -> &'static str {
        match self {
            ConfigScope::Global => "GLOBAL",
            ConfigScope::Tenant { .. } => "TENANT",
        }
    }

    fn scope_key(&self) -> String {
        match self {
            ConfigScope::Global => "global".to_string(),
            ConfigScope::Tenant { tenant_id } => tenant_id.clone(),
        }
    }
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(format!("锁获取失败: {}", e)))
    }

    /// 读取单个作用域下的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_value(&self, scope: &ConfigScope, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![scope.scope_id(), key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入配置值（作用域不存在时自动创建）
    pub fn set_value(&self, scope: &ConfigScope, key: &str, value: &str) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key) VALUES (?1, ?2, ?3)",
            params![scope.scope_id(), scope.scope_type(), scope.scope_key()],
        )?;
        tx.execute(
            r#"INSERT INTO config_kv (scope_id, key, value, updated_at)
               VALUES (?1, ?2, ?3, datetime('now', 'localtime'))
               ON CONFLICT(scope_id, key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at"#,
            params![scope.scope_id(), key, value],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// 租户生效配置（global 与 tenant 合并,tenant 优先）
    fn effective_values(&self, tenant_id: &str) -> RepositoryResult<HashMap<String, String>> {
        let conn = self.get_conn()?;
        let tenant_scope = ConfigScope::tenant(tenant_id).scope_id();

        // global 在前,tenant 后写入覆盖
        let mut stmt = conn.prepare(
            r#"SELECT key, value FROM config_kv
               WHERE scope_id IN ('global', ?1) AND key LIKE 'promotion.%'
               ORDER BY CASE scope_id WHEN 'global' THEN 0 ELSE 1 END"#,
        )?;
        let rows = stmt.query_map(params![tenant_scope], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut values = HashMap::new();
        for row in rows {
            let (key, value) = row?;
            values.insert(key, value);
        }
        Ok(values)
    }

    /// 解析租户的 PromotionSettings
    ///
    /// 格式错误的值回退为默认值并记录 warn
    pub fn promotion_settings(&self, tenant_id: &str) -> RepositoryResult<PromotionSettings> {
        let values = self.effective_values(tenant_id)?;
        let defaults = PromotionSettings::default();

        let mut settings = PromotionSettings {
            roll_number_start: parse_or_default(
                &values,
                config_keys::ROLL_NUMBER_START,
                defaults.roll_number_start,
            ),
            retain_keep_source_section: parse_bool_or_default(
                &values,
                config_keys::RETAIN_KEEP_SOURCE_SECTION,
                defaults.retain_keep_source_section,
            ),
            auto_decide_overwrite_manual: parse_bool_or_default(
                &values,
                config_keys::AUTO_DECIDE_OVERWRITE_MANUAL,
                defaults.auto_decide_overwrite_manual,
            ),
            list_default_limit: parse_or_default(
                &values,
                config_keys::LIST_DEFAULT_LIMIT,
                defaults.list_default_limit,
            ),
            list_max_limit: parse_or_default(&values, config_keys::LIST_MAX_LIMIT, defaults.list_max_limit),
        };

        if settings.roll_number_start == 0 {
            tracing::warn!(
                config_key = config_keys::ROLL_NUMBER_START,
                "学号起始值不能为 0,使用默认值"
            );
            settings.roll_number_start = defaults.roll_number_start;
        }
        if settings.list_max_limit <= 0 {
            settings.list_max_limit = defaults.list_max_limit;
        }
        if settings.list_default_limit <= 0 {
            settings.list_default_limit = defaults.list_default_limit;
        }

        Ok(settings)
    }
}

fn parse_or_default<T>(values: &HashMap<String, String>, key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match values.get(key) {
        None => default,
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
            default
        }),
    }
}

fn parse_bool_or_default(values: &HashMap<String, String>, key: &str, default: bool) -> bool {
    match values.get(key).map(|v| v.trim().to_lowercase()) {
        None => default,
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                tracing::warn!(config_key = key, raw_value = %v, "配置格式错误，使用默认值");
                default
            }
        },
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 学号
    pub const ROLL_NUMBER_START: &str = "promotion.roll_number_start";

    // 留级
    pub const RETAIN_KEEP_SOURCE_SECTION: &str = "promotion.retain_keep_source_section";

    // 自动判定
    pub const AUTO_DECIDE_OVERWRITE_MANUAL: &str = "promotion.auto_decide_overwrite_manual";

    // 列表
    pub const LIST_DEFAULT_LIMIT: &str = "promotion.list_default_limit";
    pub const LIST_MAX_LIMIT: &str = "promotion.list_max_limit";
}
