use super::*;

impl PromotionApi {
    // ==========================================
    // 规则管理接口
    // ==========================================

    /// 新建或覆盖班级升级规则
    ///
    /// # 参数
    /// - tenant_id: 租户
    /// - input: 规则内容(class_id 必填,阈值可选)
    /// - actor: 操作人
    ///
    /// # 返回
    /// - Ok(PromotionRule): 库中最终版本(覆盖时保留原 rule_id)
    pub fn create_rule(&self, tenant_id: &str, input: RuleInput, actor: &str) -> ApiResult<PromotionRule> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let actor = validator::require_text("操作人", actor)?;
        let class_id = validator::require_text("class_id", &input.class_id)?;

        let now = chrono::Local::now().naive_local();
        let rule = PromotionRule {
            rule_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.clone(),
            class_id,
            min_attendance_pct: validator::validate_pct("最低出勤率", input.min_attendance_pct)?,
            min_overall_marks_pct: validator::validate_pct("最低总成绩", input.min_overall_marks_pct)?,
            min_subjects_passed: validator::validate_count("最少及格科目数", input.min_subjects_passed)?,
            auto_promote: input.auto_promote,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };

        let saved = self.rule_repo.upsert(&rule)?;

        self.record_action(ActionLog::now(
            &tenant_id,
            None,
            ActionType::UpsertRule,
            &actor,
            Some(json!({
                "rule_id": saved.rule_id,
                "class_id": saved.class_id,
                "min_attendance_pct": saved.min_attendance_pct,
                "min_overall_marks_pct": saved.min_overall_marks_pct,
                "min_subjects_passed": saved.min_subjects_passed,
                "auto_promote": saved.auto_promote,
                "is_active": saved.is_active,
            })),
            format!("保存班级{}的升级规则", saved.class_id),
        ));

        Ok(saved)
    }

    /// 租户下全部规则
    pub fn list_rules(&self, tenant_id: &str) -> ApiResult<Vec<PromotionRule>> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        Ok(self.rule_repo.list_by_tenant(&tenant_id)?)
    }

    /// 按 rule_id 查询
    pub fn get_rule(&self, tenant_id: &str, rule_id: &str) -> ApiResult<PromotionRule> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let rule_id = validator::require_text("rule_id", rule_id)?;
        self.rule_repo
            .find_by_id(&tenant_id, &rule_id)?
            .ok_or(ApiError::RuleNotFound(rule_id))
    }

    /// 按班级查询
    pub fn get_rule_for_class(&self, tenant_id: &str, class_id: &str) -> ApiResult<Option<PromotionRule>> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let class_id = validator::require_text("class_id", class_id)?;
        Ok(self.rule_repo.find_by_class(&tenant_id, &class_id)?)
    }

    /// 删除规则
    pub fn delete_rule(&self, tenant_id: &str, rule_id: &str, actor: &str) -> ApiResult<()> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let rule_id = validator::require_text("rule_id", rule_id)?;
        let actor = validator::require_text("操作人", actor)?;

        let rows = self.rule_repo.delete(&tenant_id, &rule_id)?;
        if rows == 0 {
            return Err(ApiError::RuleNotFound(rule_id));
        }

        self.record_action(ActionLog::now(
            &tenant_id,
            None,
            ActionType::DeleteRule,
            &actor,
            Some(json!({ "rule_id": rule_id })),
            format!("删除升级规则{}", rule_id),
        ));
        Ok(())
    }
}
