// ==========================================
// 学年升级批处理 - 输入校验
// ==========================================
// 职责: 请求字段的格式/范围校验,在进入引擎之前完成
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::{BatchStatus, Decision};

/// 必填文本字段（去除首尾空白后非空）
pub fn require_text(field: &str, value: &str) -> ApiResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput(format!("{}不能为空", field)));
    }
    Ok(trimmed.to_string())
}

/// 可选文本字段:空白视为未提供
pub fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 百分比阈值: 0-100 的有限数
pub fn validate_pct(field: &str, value: Option<f64>) -> ApiResult<Option<f64>> {
    match value {
        None => Ok(None),
        Some(v) if v.is_finite() && (0.0..=100.0).contains(&v) => Ok(Some(v)),
        Some(v) => Err(ApiError::InvalidInput(format!(
            "{}必须在0-100之间，实际={}",
            field, v
        ))),
    }
}

/// 科目数: 非负
pub fn validate_count(field: &str, value: Option<i32>) -> ApiResult<Option<i32>> {
    match value {
        Some(v) if v < 0 => Err(ApiError::InvalidInput(format!("{}不能为负数，实际={}", field, v))),
        other => Ok(other),
    }
}

/// 人工覆写的决策（不允许 pending）
pub fn parse_override_decision(raw: &str) -> ApiResult<Decision> {
    match Decision::parse(raw) {
        Some(Decision::Pending) => Err(ApiError::InvalidDecision(
            "人工覆写不能设为 pending".to_string(),
        )),
        Some(d) => Ok(d),
        None => Err(ApiError::InvalidDecision(format!("未知决策: {}", raw.trim()))),
    }
}

/// 批次状态过滤值
pub fn parse_status_filter(raw: Option<&str>) -> ApiResult<Option<BatchStatus>> {
    match optional_text(raw) {
        None => Ok(None),
        Some(s) => BatchStatus::parse(&s)
            .map(Some)
            .ok_or_else(|| ApiError::InvalidInput(format!("未知批次状态: {}", s))),
    }
}
