// ==========================================
// 供应链跟踪系统 - 项目分析聚合引擎
// ==========================================
// 职责: 机器×零件 记录 → 机器摘要 → 项目摘要
// 输入: 项目、机器列表（按创建顺序）、分析视图行
// 输出: ProjectSummary
// ==========================================
// 口径:
// - 单零件封顶: ratio = min(100, quantity / required × 100)
// - 机器/项目百分比 = 有需求零件封顶比率的算术平均（非 Σquantity/Σrequired）
// - required = 0 的零件不进入分子与分母
// - 项目级按 part_number 去重合并: required/used 累加，其余按 SharedPartMerge
// ==========================================

use crate::domain::analytics::{
    derive_missing, MachinePartRecord, MachineSummary, MetricPercentages, ProjectSummary,
};
use crate::domain::project::{Project, ProjectMachine};
use crate::domain::types::SharedPartMerge;
use std::collections::HashMap;

/// 单零件单指标贡献上限
pub const PERCENTAGE_CAP: f64 = 100.0;

/// 单零件封顶比率
///
/// required <= 0 时返回 0（调用方应已跳过该零件）
pub fn capped_ratio(quantity: f64, required: f64) -> f64 {
    if !(required > 0.0) || !required.is_finite() {
        return 0.0;
    }
    let quantity = if quantity.is_finite() && quantity > 0.0 {
        quantity
    } else {
        0.0
    };
    (quantity / required * 100.0).min(PERCENTAGE_CAP)
}

/// 数量清洗: 非有限值或负数按 0 处理
fn sanitize_quantity(value: f64, field: &str, machine_id: &str, part_number: &str) -> f64 {
    if value.is_finite() && value >= 0.0 {
        return value;
    }
    tracing::warn!(
        machine_id = machine_id,
        part_number = part_number,
        field = field,
        raw_value = %value,
        "分析记录数量异常，按 0 处理"
    );
    0.0
}

/// 清洗一条分析记录并重新派生 quantity_missing
pub fn sanitize_record(record: MachinePartRecord) -> MachinePartRecord {
    let m = record.machine_id.clone();
    let p = record.part_number.clone();
    let required = sanitize_quantity(record.quantity_required, "quantity_required", &m, &p);
    let available = sanitize_quantity(record.quantity_available, "quantity_available", &m, &p);
    let used = sanitize_quantity(record.quantity_used, "quantity_used", &m, &p);
    let in_transit = sanitize_quantity(record.quantity_in_transit, "quantity_in_transit", &m, &p);
    let invoiced = sanitize_quantity(record.quantity_invoiced, "quantity_invoiced", &m, &p);

    MachinePartRecord::new(
        record.machine_id,
        record.part_number,
        record.description,
        required,
        available,
        used,
        in_transit,
        invoiced,
        record.latest_eta,
    )
}

// ==========================================
// CappedRatioAccumulator - 封顶比率累加器
// ==========================================
#[derive(Debug, Default)]
struct CappedRatioAccumulator {
    sums: MetricPercentages,
    demand_parts: usize,
}

impl CappedRatioAccumulator {
    fn add(
        &mut self,
        required: f64,
        available: f64,
        used: f64,
        in_transit: f64,
        invoiced: f64,
        missing: f64,
    ) {
        if !(required > 0.0) {
            return;
        }
        self.sums.availability += capped_ratio(available, required);
        self.sums.usage += capped_ratio(used, required);
        self.sums.transit += capped_ratio(in_transit, required);
        self.sums.invoiced += capped_ratio(invoiced, required);
        self.sums.missing += capped_ratio(missing, required);
        self.demand_parts += 1;
    }

    fn finish(&self) -> MetricPercentages {
        if self.demand_parts == 0 {
            return MetricPercentages::default();
        }
        let n = self.demand_parts as f64;
        MetricPercentages {
            availability: self.sums.availability / n,
            usage: self.sums.usage / n,
            transit: self.sums.transit / n,
            invoiced: self.sums.invoiced / n,
            missing: self.sums.missing / n,
        }
    }
}

/// 项目级合并后的单零件数量
#[derive(Debug, Clone)]
struct MergedPart {
    required: f64,
    available: f64,
    used: f64,
    in_transit: f64,
    invoiced: f64,
}

impl MergedPart {
    fn from_record(record: &MachinePartRecord) -> Self {
        Self {
            required: record.quantity_required,
            available: record.quantity_available,
            used: record.quantity_used,
            in_transit: record.quantity_in_transit,
            invoiced: record.quantity_invoiced,
        }
    }

    fn merge(&mut self, record: &MachinePartRecord, policy: SharedPartMerge) {
        self.required += record.quantity_required;
        self.used += record.quantity_used;

        if policy == SharedPartMerge::Max {
            self.available = self.available.max(record.quantity_available);
            self.in_transit = self.in_transit.max(record.quantity_in_transit);
            self.invoiced = self.invoiced.max(record.quantity_invoiced);
        }
    }

    fn missing(&self) -> f64 {
        derive_missing(
            self.required,
            self.available,
            self.used,
            self.in_transit,
            self.invoiced,
        )
    }
}

// ==========================================
// AnalyticsAggregator - 项目分析聚合引擎
// ==========================================
// 红线: 无状态引擎,所有方法都是纯函数
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticsAggregator {
    merge_policy: SharedPartMerge,
}

impl AnalyticsAggregator {
    pub fn new(merge_policy: SharedPartMerge) -> Self {
        Self { merge_policy }
    }

    /// 机器级聚合
    ///
    /// total_parts 统计全部行；百分比分母为 required > 0 的行数
    pub fn summarize_machine(
        &self,
        machine: &ProjectMachine,
        parts: Vec<MachinePartRecord>,
    ) -> MachineSummary {
        let mut acc = CappedRatioAccumulator::default();
        for part in parts.iter().filter(|p| p.has_demand()) {
            acc.add(
                part.quantity_required,
                part.quantity_available,
                part.quantity_used,
                part.quantity_in_transit,
                part.quantity_invoiced,
                part.quantity_missing,
            );
        }
        let pct = acc.finish();

        MachineSummary {
            machine_id: machine.id.clone(),
            machine_name: machine.name.clone(),
            total_parts: parts.len(),
            availability_percentage: pct.availability,
            usage_percentage: pct.usage,
            transit_percentage: pct.transit,
            invoiced_percentage: pct.invoiced,
            missing_percentage: pct.missing,
            parts_details: parts,
        }
    }

    /// 项目级聚合（跨机器按 part_number 去重）
    ///
    /// 不是机器百分比的平均值
    pub fn summarize_project(
        &self,
        project: &Project,
        machines: Vec<MachineSummary>,
    ) -> ProjectSummary {
        // 保持首次出现顺序
        let mut order: Vec<String> = Vec::new();
        let mut merged: HashMap<String, MergedPart> = HashMap::new();

        for machine in &machines {
            for record in &machine.parts_details {
                match merged.get_mut(&record.part_number) {
                    Some(part) => part.merge(record, self.merge_policy),
                    None => {
                        order.push(record.part_number.clone());
                        merged.insert(record.part_number.clone(), MergedPart::from_record(record));
                    }
                }
            }
        }

        let mut acc = CappedRatioAccumulator::default();
        for part_number in &order {
            if let Some(part) = merged.get(part_number) {
                acc.add(
                    part.required,
                    part.available,
                    part.used,
                    part.in_transit,
                    part.invoiced,
                    part.missing(),
                );
            }
        }
        let pct = acc.finish();

        ProjectSummary {
            project_id: project.id.clone(),
            project_name: project.name.clone(),
            total_machines: machines.len(),
            total_unique_parts: order.len(),
            availability_percentage: pct.availability,
            usage_percentage: pct.usage,
            transit_percentage: pct.transit,
            invoiced_percentage: pct.invoiced,
            missing_percentage: pct.missing,
            machines,
        }
    }

    /// 完整聚合: 分析行按机器分组 → 机器摘要 → 项目摘要
    ///
    /// # 参数
    /// - `project`: 项目
    /// - `machines`: 项目机器（按创建顺序）
    /// - `rows`: 分析视图行（不属于上述机器的行会被忽略）
    pub fn build_project_summary(
        &self,
        project: &Project,
        machines: &[ProjectMachine],
        rows: Vec<MachinePartRecord>,
    ) -> ProjectSummary {
        let mut by_machine: HashMap<String, Vec<MachinePartRecord>> = machines
            .iter()
            .map(|m| (m.id.clone(), Vec::new()))
            .collect();

        for row in rows {
            match by_machine.get_mut(&row.machine_id) {
                Some(parts) => parts.push(sanitize_record(row)),
                None => {
                    tracing::debug!(
                        project_id = %project.id,
                        machine_id = %row.machine_id,
                        part_number = %row.part_number,
                        "分析行不属于项目机器，已忽略"
                    );
                }
            }
        }

        let summaries: Vec<MachineSummary> = machines
            .iter()
            .map(|machine| {
                let parts = by_machine.remove(&machine.id).unwrap_or_default();
                self.summarize_machine(machine, parts)
            })
            .collect();

        self.summarize_project(project, summaries)
    }
}
