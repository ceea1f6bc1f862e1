// ==========================================
// 学年升级批处理 - 决策评估器
// ==========================================
// 职责: (表现快照, 规则, 批次目标班级) → (决策, 理由)
// 红线: 无状态、无副作用、无 I/O 操作;所有结论必须输出 reason
// ==========================================

use crate::domain::promotion::{PerformanceSnapshot, PromotionRecord, PromotionRule};
use crate::domain::types::Decision;

pub const REASON_MEETS_ALL: &str = "meets all promotion criteria";

/// 评估结果
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub decision: Decision,
    pub reason: String,
}

impl Evaluation {
    fn new(decision: Decision, reason: impl Into<String>) -> Self {
        Self {
            decision,
            reason: reason.into(),
        }
    }
}

// ==========================================
// DecisionEvaluator - 纯函数工具类
// ==========================================
pub struct DecisionEvaluator;

impl DecisionEvaluator {
    /// 评估单条升级记录
    pub fn evaluate(
        record: &PromotionRecord,
        rule: Option<&PromotionRule>,
        batch_target_class: Option<&str>,
    ) -> Evaluation {
        Self::evaluate_snapshot(&record.performance, rule, batch_target_class)
    }

    /// 评估表现快照
    ///
    /// # 规则
    /// 1. 无生效规则或 auto_promote=false → 有批次目标班级则 promote,否则 pending
    /// 2. 逐项比较已配置阈值;阈值或指标任一缺失则跳过该项
    /// 3. 全部通过 → promote;任一不通过 → retain,理由为不通过项以 "; " 连接
    pub fn evaluate_snapshot(
        snapshot: &PerformanceSnapshot,
        rule: Option<&PromotionRule>,
        batch_target_class: Option<&str>,
    ) -> Evaluation {
        let has_target = batch_target_class.map(|c| !c.trim().is_empty()).unwrap_or(false);

        let rule = match rule.filter(|r| r.is_active) {
            Some(r) if r.auto_promote => r,
            Some(_) => return Self::fallback(has_target, "auto-promote disabled for class"),
            None => return Self::fallback(has_target, "no active promotion rule for class"),
        };

        let failures = Self::failed_checks(snapshot, rule);
        if failures.is_empty() {
            Evaluation::new(Decision::Promote, REASON_MEETS_ALL)
        } else {
            Evaluation::new(Decision::Retain, failures.join("; "))
        }
    }

    fn fallback(has_target: bool, why: &str) -> Evaluation {
        if has_target {
            Evaluation::new(
                Decision::Promote,
                format!("{}; promoted to batch destination class by default", why),
            )
        } else {
            Evaluation::new(
                Decision::Pending,
                format!("{}; no destination class known, manual decision required", why),
            )
        }
    }

    /// 不通过的检查项（实际值 vs 要求值）
    fn failed_checks(snapshot: &PerformanceSnapshot, rule: &PromotionRule) -> Vec<String> {
        let mut failures = Vec::new();

        if let (Some(min), Some(actual)) = (rule.min_attendance_pct, snapshot.attendance_pct) {
            if actual < min {
                failures.push(format!("Attendance {:.1}% < required {:.1}%", actual, min));
            }
        }

        if let (Some(min), Some(actual)) = (rule.min_overall_marks_pct, snapshot.overall_marks_pct) {
            if actual < min {
                failures.push(format!("Overall marks {:.1}% < required {:.1}%", actual, min));
            }
        }

        if let (Some(min), Some(actual)) = (rule.min_subjects_passed, snapshot.subjects_passed) {
            if actual < min {
                failures.push(format!("Subjects passed {} < required {}", actual, min));
            }
        }

        failures
    }
}
