use super::*;

impl PromotionApi {
    // ==========================================
    // 批次处理接口
    // ==========================================

    /// 处理批次
    ///
    /// # 参数
    /// - req.generate_roll_numbers: 为未指定学号的学生按目标分班顺序分配学号
    /// - req.completion_date: 原学籍结束日期(默认当天)
    ///
    /// # 返回
    /// - Ok(ProcessOutcome): 批次 completed
    /// - Err(...): 全部回滚;被拒绝的尝试同样记入操作日志
    pub fn process_batch(
        &self,
        tenant_id: &str,
        batch_id: &str,
        req: ProcessBatchRequest,
        actor: &str,
    ) -> ApiResult<ProcessOutcome> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let batch_id = validator::require_text("batch_id", batch_id)?;
        let actor = validator::require_text("操作人", actor)?;
        let settings = self.settings(&tenant_id)?;

        let options = ProcessOptions {
            generate_roll_numbers: req.generate_roll_numbers,
            completion_date: req.completion_date,
        };

        match self
            .processor
            .process(&tenant_id, &batch_id, &options, &settings, &actor)
        {
            Ok(outcome) => {
                self.record_action(ActionLog::now(
                    &tenant_id,
                    Some(&batch_id),
                    ActionType::ProcessBatch,
                    &actor,
                    Some(json!({
                        "promoted": outcome.promoted,
                        "retained": outcome.retained,
                        "transferred": outcome.transferred,
                        "enrollments_created": outcome.enrollments_created,
                        "source_enrollments_completed": outcome.source_enrollments_completed,
                        "roll_numbers_generated": outcome.roll_numbers_generated,
                        "options": options,
                        "settings": settings,
                    })),
                    format!(
                        "处理完成: 升级{} 留级{} 转出{}",
                        outcome.promoted, outcome.retained, outcome.transferred
                    ),
                ));
                Ok(outcome)
            }
            Err(err) => {
                let err = ApiError::from(err);
                self.record_action(ActionLog::now(
                    &tenant_id,
                    Some(&batch_id),
                    ActionType::ProcessRejected,
                    &actor,
                    Some(json!({
                        "code": err.code(),
                        "options": options,
                    })),
                    err.to_string(),
                ));
                Err(err)
            }
        }
    }
}
