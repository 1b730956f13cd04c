// ==========================================
// 供应链跟踪系统 - 项目与机器实体
// ==========================================

use serde::{Deserialize, Serialize};

/// 项目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

/// 项目下的机器
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMachine {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub start_date: Option<String>, // YYYY-MM-DD
    pub end_date: Option<String>,   // YYYY-MM-DD
    pub created_at: String,
}

/// 机器零件需求行（project_machine_parts）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachinePartRequirement {
    pub machine_id: String,
    pub part_number: String,
    pub description: Option<String>,
    pub quantity_required: f64,
    pub quantity_used: f64,
}
