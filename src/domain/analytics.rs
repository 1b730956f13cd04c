// ==========================================
// 供应链跟踪系统 - 项目分析实体
// ==========================================
// 职责: 定义 机器×零件 分析记录、机器摘要、项目摘要
// 说明: 三者均为临时计算结果，不做持久化
// ==========================================

use serde::{Deserialize, Serialize};

/// 计算缺口数量: max(0, required − available − used − in_transit − invoiced)
pub fn derive_missing(
    required: f64,
    available: f64,
    used: f64,
    in_transit: f64,
    invoiced: f64,
) -> f64 {
    (required - available - used - in_transit - invoiced).max(0.0)
}

/// 机器×零件 分析记录（来自 mv_project_analytics_complete）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachinePartRecord {
    pub machine_id: String,
    pub part_number: String,
    pub description: Option<String>,
    /// 该机器对该零件的需求量
    pub quantity_required: f64,
    /// 库存可用量
    pub quantity_available: f64,
    /// 已使用/已安装量
    pub quantity_used: f64,
    /// 欠货(BACKORDER)数量，界面标签 "In Backorders"
    pub quantity_in_transit: f64,
    /// 已开票未到货数量，界面标签 "In Transit"
    pub quantity_invoiced: f64,
    /// 缺口数量（派生）
    pub quantity_missing: f64,
    /// 最近的预计到货日期
    pub latest_eta: Option<String>,
}

impl MachinePartRecord {
    /// 创建记录并派生 quantity_missing
    pub fn new(
        machine_id: String,
        part_number: String,
        description: Option<String>,
        quantity_required: f64,
        quantity_available: f64,
        quantity_used: f64,
        quantity_in_transit: f64,
        quantity_invoiced: f64,
        latest_eta: Option<String>,
    ) -> Self {
        let quantity_missing = derive_missing(
            quantity_required,
            quantity_available,
            quantity_used,
            quantity_in_transit,
            quantity_invoiced,
        );

        Self {
            machine_id,
            part_number,
            description,
            quantity_required,
            quantity_available,
            quantity_used,
            quantity_in_transit,
            quantity_invoiced,
            quantity_missing,
            latest_eta,
        }
    }

    /// 是否存在需求（required > 0 才参与百分比计算）
    pub fn has_demand(&self) -> bool {
        self.quantity_required > 0.0
    }
}

/// 五项百分比指标
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricPercentages {
    pub availability: f64,
    pub usage: f64,
    pub transit: f64,
    pub invoiced: f64,
    pub missing: f64,
}

/// 机器摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineSummary {
    pub machine_id: String,
    pub machine_name: String,
    /// 全部零件行数（含 required = 0 的行，仅用于展示）
    pub total_parts: usize,
    pub availability_percentage: f64,
    pub usage_percentage: f64,
    pub transit_percentage: f64,
    pub invoiced_percentage: f64,
    pub missing_percentage: f64,
    pub parts_details: Vec<MachinePartRecord>,
}

impl MachineSummary {
    pub fn percentages(&self) -> MetricPercentages {
        MetricPercentages {
            availability: self.availability_percentage,
            usage: self.usage_percentage,
            transit: self.transit_percentage,
            invoiced: self.invoiced_percentage,
            missing: self.missing_percentage,
        }
    }
}

/// 项目摘要
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub project_id: String,
    pub project_name: String,
    pub total_machines: usize,
    /// 跨机器去重后的零件数
    pub total_unique_parts: usize,
    pub availability_percentage: f64,
    pub usage_percentage: f64,
    pub transit_percentage: f64,
    pub invoiced_percentage: f64,
    pub missing_percentage: f64,
    pub machines: Vec<MachineSummary>,
}

impl ProjectSummary {
    pub fn percentages(&self) -> MetricPercentages {
        MetricPercentages {
            availability: self.availability_percentage,
            usage: self.usage_percentage,
            transit: self.transit_percentage,
            invoiced: self.invoiced_percentage,
            missing: self.missing_percentage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_missing_never_negative() {
        assert_eq!(derive_missing(4.0, 0.0, 0.0, 0.0, 0.0), 4.0);
        assert_eq!(derive_missing(10.0, 5.0, 5.0, 0.0, 0.0), 0.0);
        assert_eq!(derive_missing(10.0, 50.0, 0.0, 0.0, 0.0), 0.0);
        assert_eq!(derive_missing(10.0, 2.0, 3.0, 1.0, 1.0), 3.0);
    }

    #[test]
    fn test_record_new_derives_missing() {
        let record = MachinePartRecord::new(
            "M1".to_string(),
            "P2".to_string(),
            None,
            4.0,
            0.0,
            0.0,
            0.0,
            0.0,
            None,
        );
        assert_eq!(record.quantity_missing, 4.0);
        assert!(record.has_demand());
    }
}
