// ==========================================
// 供应链跟踪系统 - 领域类型定义
// ==========================================
// 职责: 定义枚举类型与值对象
// 红线: 不含数据访问逻辑
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// SharedPartMerge - 跨机器共用零件的合并策略
// ==========================================
// 适用字段: quantity_available / quantity_in_transit / quantity_invoiced
// quantity_required / quantity_used 始终累加
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SharedPartMerge {
    /// 取首次遇到的机器记录（按机器创建顺序）
    #[default]
    FirstWins,
    /// 取所有机器记录中的最大值
    Max,
}

impl SharedPartMerge {
    pub fn as_str(&self) -> &str {
        match self {
            SharedPartMerge::FirstWins => "FIRST_WINS",
            SharedPartMerge::Max => "MAX",
        }
    }

    /// 从配置值解析（大小写不敏感，未知值返回 None）
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "FIRST_WINS" | "FIRST" => Some(SharedPartMerge::FirstWins),
            "MAX" => Some(SharedPartMerge::Max),
            _ => None,
        }
    }
}

impl fmt::Display for SharedPartMerge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// OrderStatus - 订单状态
// ==========================================
// BACKORDER → 计入 quantity_in_transit（界面标签 "In Backorders"）
// INVOICED  → 计入 quantity_invoiced（界面标签 "In Transit"）
// RECEIVED  → 已入库，不再计入在途
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Backorder,
    Invoiced,
    Received,
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Backorder => "BACKORDER",
            OrderStatus::Invoiced => "INVOICED",
            OrderStatus::Received => "RECEIVED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "BACKORDER" => Some(OrderStatus::Backorder),
            "INVOICED" => Some(OrderStatus::Invoiced),
            "RECEIVED" => Some(OrderStatus::Received),
            _ => None,
        }
    }

    /// 是否仍未到货
    pub fn is_outstanding(&self) -> bool {
        !matches!(self, OrderStatus::Received)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
