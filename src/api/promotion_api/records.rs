use super::*;

impl PromotionApi {
    // ==========================================
    // 记录接口
    // ==========================================

    /// 批次记录列表 + 汇总
    pub fn list_records(&self, tenant_id: &str, batch_id: &str) -> ApiResult<RecordListing> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let batch_id = validator::require_text("batch_id", batch_id)?;

        // 批次不存在与"批次没有记录"要区分开
        self.lifecycle.load(&tenant_id, &batch_id)?;
        Ok(self.record_manager.list_records(&tenant_id, &batch_id)?)
    }

    /// 单条人工覆写
    pub fn update_record(
        &self,
        tenant_id: &str,
        batch_id: &str,
        req: RecordUpdateRequest,
        actor: &str,
    ) -> ApiResult<PromotionRecord> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let batch_id = validator::require_text("batch_id", batch_id)?;
        let actor = validator::require_text("操作人", actor)?;
        let update = Self::to_record_update(req)?;

        let record = self
            .record_manager
            .update_record(&tenant_id, &batch_id, &update, &actor)?;

        self.record_action(ActionLog::now(
            &tenant_id,
            Some(&batch_id),
            ActionType::UpdateRecord,
            &actor,
            Some(json!({
                "record_id": record.record_id,
                "student_id": record.student_id,
                "decision": record.decision,
                "target_class_id": record.target_class_id,
                "override_reason": record.override_reason,
            })),
            format!("人工覆写学生{}为{}", record.student_id, record.decision),
        ));

        Ok(record)
    }

    /// 批量人工覆写
    ///
    /// # 返回
    /// - Ok(BulkUpdateOutcome): 已更新与跳过(批次内不存在)的 record_id
    /// - Err(InvalidDecision): 任一条决策无效,整体不写入
    pub fn bulk_update_records(
        &self,
        tenant_id: &str,
        batch_id: &str,
        reqs: Vec<RecordUpdateRequest>,
        actor: &str,
    ) -> ApiResult<BulkUpdateOutcome> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let batch_id = validator::require_text("batch_id", batch_id)?;
        let actor = validator::require_text("操作人", actor)?;
        if reqs.is_empty() {
            return Err(ApiError::InvalidInput("覆写列表不能为空".to_string()));
        }

        let updates = reqs
            .into_iter()
            .map(Self::to_record_update)
            .collect::<ApiResult<Vec<_>>>()?;

        let outcome = self
            .record_manager
            .bulk_update(&tenant_id, &batch_id, &updates, &actor)?;

        self.record_action(ActionLog::now(
            &tenant_id,
            Some(&batch_id),
            ActionType::BulkUpdate,
            &actor,
            Some(json!({
                "updated": outcome.updated,
                "skipped": outcome.skipped,
            })),
            format!(
                "批量覆写{}条,跳过{}条",
                outcome.updated.len(),
                outcome.skipped.len()
            ),
        ));

        Ok(outcome)
    }

    /// 按来源班级规则自动判定
    pub fn auto_decide(&self, tenant_id: &str, batch_id: &str, actor: &str) -> ApiResult<AutoDecideSummary> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let batch_id = validator::require_text("batch_id", batch_id)?;
        let actor = validator::require_text("操作人", actor)?;
        let settings = self.settings(&tenant_id)?;

        let summary = self.record_manager.auto_decide(&tenant_id, &batch_id, &settings)?;

        self.record_action(ActionLog::now(
            &tenant_id,
            Some(&batch_id),
            ActionType::AutoDecide,
            &actor,
            serde_json::to_value(&summary).ok(),
            format!(
                "自动判定{}条: 升级{} 留级{} 待定{}",
                summary.evaluated, summary.promote, summary.retain, summary.pending
            ),
        ));

        Ok(summary)
    }

    fn to_record_update(req: RecordUpdateRequest) -> ApiResult<RecordUpdate> {
        Ok(RecordUpdate {
            record_id: validator::require_text("record_id", &req.record_id)?,
            decision: validator::parse_override_decision(&req.decision)?,
            target_class_id: validator::optional_text(req.target_class_id.as_deref()),
            target_section_id: validator::optional_text(req.target_section_id.as_deref()),
            target_roll_number: validator::optional_text(req.target_roll_number.as_deref()),
            decision_reason: validator::optional_text(req.decision_reason.as_deref()),
            retention_reason: validator::optional_text(req.retention_reason.as_deref()),
            transfer_destination: validator::optional_text(req.transfer_destination.as_deref()),
            override_reason: validator::optional_text(req.override_reason.as_deref()),
        })
    }
}
