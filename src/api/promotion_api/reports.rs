use super::*;

impl PromotionApi {
    /// 批次报表(只读)
    pub fn get_report(&self, tenant_id: &str, batch_id: &str) -> ApiResult<PromotionReport> {
        let tenant_id = validator::require_text("tenant_id", tenant_id)?;
        let batch_id = validator::require_text("batch_id", batch_id)?;
        Ok(self.report_builder.build(&tenant_id, &batch_id)?)
    }
}
