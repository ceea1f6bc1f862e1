// ==========================================
// 学年升级批处理 - 升级规则仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 约束: (tenant_id, class_id) 唯一,写入一律 UPSERT
// ==========================================

use crate::db::{fmt_ts, get_ts};
use crate::domain::promotion::PromotionRule;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const RULE_COLUMNS: &str = r#"rule_id, tenant_id, class_id, min_attendance_pct,
       min_overall_marks_pct, min_subjects_passed, auto_promote, is_active,
       created_at, updated_at"#;

// ==========================================
// PromotionRuleRepository - 升级规则仓储
// ==========================================
pub struct PromotionRuleRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PromotionRuleRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 按 (tenant_id, class_id) 新建或覆盖规则
    ///
    /// 已存在时保留原 rule_id 与 created_at,返回库中最终版本
    pub fn upsert(&self, rule: &PromotionRule) -> RepositoryResult<PromotionRule> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO promotion_rule (
                rule_id, tenant_id, class_id, min_attendance_pct,
                min_overall_marks_pct, min_subjects_passed, auto_promote, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(tenant_id, class_id) DO UPDATE SET
                min_attendance_pct = excluded.min_attendance_pct,
                min_overall_marks_pct = excluded.min_overall_marks_pct,
                min_subjects_passed = excluded.min_subjects_passed,
                auto_promote = excluded.auto_promote,
                is_active = excluded.is_active,
                updated_at = excluded.updated_at"#,
            params![
                rule.rule_id,
                rule.tenant_id,
                rule.class_id,
                rule.min_attendance_pct,
                rule.min_overall_marks_pct,
                rule.min_subjects_passed,
                rule.auto_promote,
                rule.is_active,
                fmt_ts(&rule.created_at),
                fmt_ts(&rule.updated_at),
            ],
        )?;

        Self::find_by_class_in(&conn, &rule.tenant_id, &rule.class_id)?
            .ok_or_else(|| RepositoryError::not_found("PromotionRule", &rule.class_id))
    }

    /// 按 rule_id 查询
    pub fn find_by_id(&self, tenant_id: &str, rule_id: &str) -> RepositoryResult<Option<PromotionRule>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM promotion_rule WHERE tenant_id = ?1 AND rule_id = ?2",
            RULE_COLUMNS
        );
        let rule = conn
            .query_row(&sql, params![tenant_id, rule_id], map_row)
            .optional()?;
        Ok(rule)
    }

    /// 按班级查询
    pub fn find_by_class(&self, tenant_id: &str, class_id: &str) -> RepositoryResult<Option<PromotionRule>> {
        let conn = self.get_conn()?;
        Self::find_by_class_in(&conn, tenant_id, class_id)
    }

    /// 按班级查询（在调用方的连接/事务内）
    pub fn find_by_class_in(
        conn: &Connection,
        tenant_id: &str,
        class_id: &str,
    ) -> RepositoryResult<Option<PromotionRule>> {
        let sql = format!(
            "SELECT {} FROM promotion_rule WHERE tenant_id = ?1 AND class_id = ?2",
            RULE_COLUMNS
        );
        let rule = conn
            .query_row(&sql, params![tenant_id, class_id], map_row)
            .optional()?;
        Ok(rule)
    }

    /// 租户下全部规则,按班级排序
    pub fn list_by_tenant(&self, tenant_id: &str) -> RepositoryResult<Vec<PromotionRule>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM promotion_rule WHERE tenant_id = ?1 ORDER BY class_id",
            RULE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rules = stmt
            .query_map(params![tenant_id], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    /// 删除规则,返回删除行数
    pub fn delete(&self, tenant_id: &str, rule_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            "DELETE FROM promotion_rule WHERE tenant_id = ?1 AND rule_id = ?2",
            params![tenant_id, rule_id],
        )?;
        Ok(rows)
    }
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<PromotionRule> {
    Ok(PromotionRule {
        rule_id: row.get(0)?,
        tenant_id: row.get(1)?,
        class_id: row.get(2)?,
        min_attendance_pct: row.get(3)?,
        min_overall_marks_pct: row.get(4)?,
        min_subjects_passed: row.get(5)?,
        auto_promote: row.get(6)?,
        is_active: row.get(7)?,
        created_at: get_ts(row, 8)?,
        updated_at: get_ts(row, 9)?,
    })
}
