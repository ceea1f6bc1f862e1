use super::core::ActionLogRepository;
use crate::db::get_ts;
use crate::domain::action_log::{ActionLog, ActionType};
use crate::repository::error::RepositoryResult;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

const LOG_COLUMNS: &str =
    "action_id, tenant_id, batch_id, action_type, action_ts, actor, payload_json, detail";

impl ActionLogRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 按 action_id 查询单个日志
    pub fn find_by_id(&self, tenant_id: &str, action_id: &str) -> RepositoryResult<Option<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM action_log WHERE tenant_id = ?1 AND action_id = ?2",
            LOG_COLUMNS
        );
        let log = conn
            .query_row(&sql, params![tenant_id, action_id], map_row)
            .optional()?;
        Ok(log)
    }

    /// 查询指定批次的操作日志（时间倒序）
    pub fn find_by_batch(&self, tenant_id: &str, batch_id: &str) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT {} FROM action_log
               WHERE tenant_id = ?1 AND batch_id = ?2
               ORDER BY action_ts DESC, rowid DESC"#,
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![tenant_id, batch_id], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }

    /// 查询租户最近的操作日志
    pub fn find_recent(&self, tenant_id: &str, limit: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"SELECT {} FROM action_log
               WHERE tenant_id = ?1
               ORDER BY action_ts DESC, rowid DESC
               LIMIT ?2"#,
            LOG_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let logs = stmt
            .query_map(params![tenant_id, limit], map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(logs)
    }
}

/// 映射数据库行到 ActionLog
fn map_row(row: &Row) -> SqliteResult<ActionLog> {
    let type_str: String = row.get(3)?;
    let action_type = ActionType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown action type: {}", type_str).into(),
        )
    })?;

    let payload: Option<String> = row.get(6)?;

    Ok(ActionLog {
        action_id: row.get(0)?,
        tenant_id: row.get(1)?,
        batch_id: row.get(2)?,
        action_type,
        action_ts: get_ts(row, 4)?,
        actor: row.get(5)?,
        // 损坏的 JSON 只影响展示,不阻断审计查询
        payload_json: payload.and_then(|s| serde_json::from_str(&s).ok()),
        detail: row.get(7)?,
    })
}
