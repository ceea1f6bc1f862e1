// ==========================================
// 学年升级批处理 - 升级批处理 API
// ==========================================
// 职责: 规则管理、批次管理、记录覆写、自动判定、处理、报表
// 红线: 所有写入必须记录 ActionLog(尽力而为,失败只告警)
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::api::validator;
use crate::config::{ConfigManager, PromotionSettings};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::promotion::{PromotionBatch, PromotionRecord, PromotionRule};
use crate::domain::report::PromotionReport;
use crate::engine::{
    AutoDecideSummary, BatchLifecycleManager, BatchProcessor, BulkUpdateOutcome, NewBatch,
    ProcessOptions, ProcessOutcome, RecordListing, RecordManager, RecordUpdate, ReportBuilder,
};
use crate::repository::action_log_repo::ActionLogRepository;
use crate::repository::batch_repo::{BatchListFilter, PromotionBatchRepository};
use crate::repository::rule_repo::PromotionRuleRepository;

mod batches;
mod processing;
mod records;
mod reports;
mod rules;

// ==========================================
// 请求参数
// ==========================================

/// 新建/更新规则
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleInput {
    pub class_id: String,
    pub min_attendance_pct: Option<f64>,
    pub min_overall_marks_pct: Option<f64>,
    pub min_subjects_passed: Option<i32>,
    pub auto_promote: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

/// 创建批次
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateBatchRequest {
    pub source_academic_year_id: String,
    pub source_class_id: String,
    pub source_section_id: Option<String>,
    pub dest_academic_year_id: String,
    pub dest_class_id: Option<String>,
    pub notes: Option<String>,
}

/// 批次列表查询
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchListQuery {
    pub status: Option<String>,
    pub source_academic_year_id: Option<String>,
    pub source_class_id: Option<String>,
    pub limit: Option<i64>,
}

/// 人工覆写(决策为原始字符串,由校验器解析)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordUpdateRequest {
    pub record_id: String,
    pub decision: String,
    pub target_class_id: Option<String>,
    pub target_section_id: Option<String>,
    pub target_roll_number: Option<String>,
    pub decision_reason: Option<String>,
    pub retention_reason: Option<String>,
    pub transfer_destination: Option<String>,
    pub override_reason: Option<String>,
}

/// 处理批次
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessBatchRequest {
    pub generate_roll_numbers: bool,
    pub completion_date: Option<NaiveDate>,
}

// ==========================================
// PromotionApi - 升级批处理 API
// ==========================================

/// 升级批处理API
///
/// 职责：
/// 1. 班级升级规则（新建/覆盖、查询、删除）
/// 2. 批次生命周期（创建、查询、取消、删除）
/// 3. 记录（列表+汇总、单条/批量覆写、规则自动判定）
/// 4. 批次处理与报表
pub struct PromotionApi {
    rule_repo: Arc<PromotionRuleRepository>,
    batch_repo: Arc<PromotionBatchRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config_manager: Arc<ConfigManager>,
    lifecycle: Arc<BatchLifecycleManager>,
    record_manager: Arc<RecordManager>,
    processor: Arc<BatchProcessor>,
    report_builder: Arc<ReportBuilder>,
}

impl PromotionApi {
    /// 创建新的PromotionApi实例
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rule_repo: Arc<PromotionRuleRepository>,
        batch_repo: Arc<PromotionBatchRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
        lifecycle: Arc<BatchLifecycleManager>,
        record_manager: Arc<RecordManager>,
        processor: Arc<BatchProcessor>,
        report_builder: Arc<ReportBuilder>,
    ) -> Self {
        Self {
            rule_repo,
            batch_repo,
            action_log_repo,
            config_manager,
            lifecycle,
            record_manager,
            processor,
            report_builder,
        }
    }

    /// 解析租户配置(每次调用一次)
    fn settings(&self, tenant_id: &str) -> ApiResult<PromotionSettings> {
        Ok(self.config_manager.promotion_settings(tenant_id)?)
    }

    /// 记录操作日志;失败只告警,不影响业务结果
    fn record_action(&self, log: ActionLog) {
        if let Err(e) = self.action_log_repo.insert(&log) {
            tracing::warn!(
                action_type = log.action_type.as_str(),
                tenant_id = %log.tenant_id,
                batch_id = ?log.batch_id,
                error = %e,
                "操作日志写入失败"
            );
        }
    }

    /// 查询批次操作日志
    pub fn list_action_logs(&self, tenant_id: &str, batch_id: &str) -> ApiResult<Vec<ActionLog>> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let batch_id = validator::require_text("batch_id", batch_id)?;
        Ok(self.action_log_repo.find_by_batch(&tenant_id, &batch_id)?)
    }
}
