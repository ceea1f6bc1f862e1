use super::*;

impl PromotionApi {
    // ==========================================
    // 批次管理接口
    // ==========================================

    /// 创建升级批次
    ///
    /// # 参数
    /// - tenant_id: 租户
    /// - req: 来源(学年/班级/可选分班)与目标(学年/可选班级)
    /// - actor: 创建人
    ///
    /// # 返回
    /// - Ok(PromotionBatch): draft 批次,每名在读学生一条 pending 记录
    /// - Err(InvalidAcademicYearPair / DuplicateBatchForSource / NoStudentsInSourceScope)
    pub fn create_batch(&self, tenant_id: &str, req: CreateBatchRequest, actor: &str) -> ApiResult<PromotionBatch> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let actor = validator::require_text("创建人", actor)?;

        let new_batch = NewBatch {
            source_academic_year_id: validator::require_text("来源学年", &req.source_academic_year_id)?,
            source_class_id: validator::require_text("来源班级", &req.source_class_id)?,
            source_section_id: validator::optional_text(req.source_section_id.as_deref()),
            dest_academic_year_id: validator::require_text("目标学年", &req.dest_academic_year_id)?,
            dest_class_id: validator::optional_text(req.dest_class_id.as_deref()),
            notes: validator::optional_text(req.notes.as_deref()),
        };

        let batch = self.lifecycle.create_batch(&tenant_id, &new_batch, &actor)?;

        self.record_action(ActionLog::now(
            &tenant_id,
            Some(&batch.batch_id),
            ActionType::CreateBatch,
            &actor,
            Some(json!({
                "source_academic_year_id": batch.source_academic_year_id,
                "source_class_id": batch.source_class_id,
                "source_section_id": batch.source_section_id,
                "dest_academic_year_id": batch.dest_academic_year_id,
                "dest_class_id": batch.dest_class_id,
                "total_students": batch.total_students,
            })),
            format!("创建升级批次,学生{}名", batch.total_students),
        ));

        Ok(batch)
    }

    /// 批次列表
    pub fn list_batches(&self, tenant_id: &str, query: BatchListQuery) -> ApiResult<Vec<PromotionBatch>> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let settings = self.settings(&tenant_id)?;

        let filter = BatchListFilter {
            status: validator::parse_status_filter(query.status.as_deref())?,
            source_academic_year_id: validator::optional_text(query.source_academic_year_id.as_deref()),
            source_class_id: validator::optional_text(query.source_class_id.as_deref()),
        };

        Ok(self
            .batch_repo
            .list(&tenant_id, &filter, settings.clamp_limit(query.limit))?)
    }

    /// 批次详情
    pub fn get_batch(&self, tenant_id: &str, batch_id: &str) -> ApiResult<PromotionBatch> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let batch_id = validator::require_text("batch_id", batch_id)?;
        Ok(self.lifecycle.load(&tenant_id, &batch_id)?)
    }

    /// 取消批次（仅 draft,必须给出理由）
    pub fn cancel_batch(
        &self,
        tenant_id: &str,
        batch_id: &str,
        reason: &str,
        actor: &str,
    ) -> ApiResult<PromotionBatch> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let batch_id = validator::require_text("batch_id", batch_id)?;
        let reason = validator::require_text("取消原因", reason)?;
        let actor = validator::require_text("操作人", actor)?;

        let batch = self.lifecycle.cancel_batch(&tenant_id, &batch_id, &reason, &actor)?;

        self.record_action(ActionLog::now(
            &tenant_id,
            Some(&batch_id),
            ActionType::CancelBatch,
            &actor,
            Some(json!({ "reason": reason })),
            format!("取消升级批次: {}", reason),
        ));

        Ok(batch)
    }

    /// 删除批次及其记录（仅 draft）
    pub fn delete_batch(&self, tenant_id: &str, batch_id: &str, actor: &str) -> ApiResult<()> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let batch_id = validator::require_text("batch_id", batch_id)?;
        let actor = validator::require_text("操作人", actor)?;

        let deleted = self.lifecycle.delete_batch(&tenant_id, &batch_id)?;

        self.record_action(ActionLog::now(
            &tenant_id,
            Some(&batch_id),
            ActionType::DeleteBatch,
            &actor,
            Some(json!({
                "source_class_id": deleted.source_class_id,
                "total_students": deleted.total_students,
            })),
            "删除升级批次",
        ));

        Ok(())
    }
}
