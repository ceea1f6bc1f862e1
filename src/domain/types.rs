// ==========================================
// 学年升级批处理 - 领域类型定义
// ==========================================
// 职责: 批次状态、学生决策、学籍状态的闭合枚举
// 红线: 状态一律走枚举,不在业务代码里比较裸字符串
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 批次状态 (Batch Status)
// ==========================================
// 状态机: draft → processing → completed
//         draft → cancelled
// completed / cancelled 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Draft,      // 草稿(可编辑)
    Processing, // 处理中
    Completed,  // 已完成
    Cancelled,  // 已取消
}

impl BatchStatus {
    /// 数据库存储值
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Draft => "draft",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Cancelled => "cancelled",
        }
    }

    /// 从数据库值解析（未知值返回 None,由调用方决定如何报错）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Some(BatchStatus::Draft),
            "processing" => Some(BatchStatus::Processing),
            "completed" => Some(BatchStatus::Completed),
            "cancelled" => Some(BatchStatus::Cancelled),
            _ => None,
        }
    }

    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Cancelled)
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 升级决策 (Decision)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Pending,  // 待定
    Promote,  // 升级
    Retain,   // 留级
    Transfer, // 转出
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Pending => "pending",
            Decision::Promote => "promote",
            Decision::Retain => "retain",
            Decision::Transfer => "transfer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(Decision::Pending),
            "promote" => Some(Decision::Promote),
            "retain" => Some(Decision::Retain),
            "transfer" => Some(Decision::Transfer),
            _ => None,
        }
    }

    /// 处理时是否需要创建新学年学籍
    pub fn creates_enrollment(&self) -> bool {
        matches!(self, Decision::Promote | Decision::Retain)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 学籍状态 (Enrollment Status)
// ==========================================
// 学籍归属学籍模块,本引擎只创建 active 与置为 completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Transferred,
    Dropout,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Transferred => "transferred",
            EnrollmentStatus::Dropout => "dropout",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Some(EnrollmentStatus::Active),
            "completed" => Some(EnrollmentStatus::Completed),
            "transferred" => Some(EnrollmentStatus::Transferred),
            "dropout" => Some(EnrollmentStatus::Dropout),
            _ => None,
        }
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
