// ==========================================
// 学年升级批处理 - 操作日志领域模型
// ==========================================
// 红线: 所有写入必须记录
// 用途: 审计追踪(谁在何时对哪个批次做了什么)
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    pub action_id: String,
    pub tenant_id: String,
    pub batch_id: Option<String>, // 规则类操作无批次
    pub action_type: ActionType,
    pub action_ts: NaiveDateTime,
    pub actor: String,
    pub payload_json: Option<JsonValue>,
    pub detail: Option<String>,
}

impl ActionLog {
    /// 以当前时间构造一条日志
    pub fn now(
        tenant_id: &str,
        batch_id: Option<&str>,
        action_type: ActionType,
        actor: &str,
        payload_json: Option<JsonValue>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            batch_id: batch_id.map(str::to_string),
            action_type,
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            payload_json,
            detail: Some(detail.into()),
        }
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    UpsertRule,      // 新建/更新规则
    DeleteRule,      // 删除规则
    CreateBatch,     // 创建批次
    CancelBatch,     // 取消批次
    DeleteBatch,     // 删除批次
    UpdateRecord,    // 单条人工覆写
    BulkUpdate,      // 批量人工覆写
    AutoDecide,      // 规则自动判定
    ProcessBatch,    // 处理批次
    ProcessRejected, // 处理被拒绝(已回滚)
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::UpsertRule => "UPSERT_RULE",
            ActionType::DeleteRule => "DELETE_RULE",
            ActionType::CreateBatch => "CREATE_BATCH",
            ActionType::CancelBatch => "CANCEL_BATCH",
            ActionType::DeleteBatch => "DELETE_BATCH",
            ActionType::UpdateRecord => "UPDATE_RECORD",
            ActionType::BulkUpdate => "BULK_UPDATE",
            ActionType::AutoDecide => "AUTO_DECIDE",
            ActionType::ProcessBatch => "PROCESS_BATCH",
            ActionType::ProcessRejected => "PROCESS_REJECTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UPSERT_RULE" => Some(ActionType::UpsertRule),
            "DELETE_RULE" => Some(ActionType::DeleteRule),
            "CREATE_BATCH" => Some(ActionType::CreateBatch),
            "CANCEL_BATCH" => Some(ActionType::CancelBatch),
            "DELETE_BATCH" => Some(ActionType::DeleteBatch),
            "UPDATE_RECORD" => Some(ActionType::UpdateRecord),
            "BULK_UPDATE" => Some(ActionType::BulkUpdate),
            "AUTO_DECIDE" => Some(ActionType::AutoDecide),
            "PROCESS_BATCH" => Some(ActionType::ProcessBatch),
            "PROCESS_REJECTED" => Some(ActionType::ProcessRejected),
            _ => None,
        }
    }
}
