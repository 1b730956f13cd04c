// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、AppState 初始化、项目数据生成
// ==========================================
#![allow(dead_code)]

use std::error::Error;

use supply_tracker::app::AppState;
use supply_tracker::domain::project::{MachinePartRequirement, Project, ProjectMachine};
use supply_tracker::domain::types::OrderStatus;
use supply_tracker::repository::OrderLine;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 AppState
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - AppState: 应用状态
pub fn create_test_state() -> Result<(NamedTempFile, AppState), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("temp path is not valid UTF-8")?
        .to_string();
    let state = AppState::new(db_path)?;
    Ok((temp_file, state))
}

/// 单个零件的种子数据
///
/// available 写入全局库存；in_transit / invoiced 生成挂在该机器上的订单
#[derive(Debug, Clone, Copy)]
pub struct PartSeed<'a> {
    pub part_number: &'a str,
    pub required: f64,
    pub available: f64,
    pub used: f64,
    pub in_transit: f64,
    pub invoiced: f64,
}

impl<'a> PartSeed<'a> {
    pub fn new(part_number: &'a str, required: f64) -> Self {
        Self {
            part_number,
            required,
            available: 0.0,
            used: 0.0,
            in_transit: 0.0,
            invoiced: 0.0,
        }
    }

    pub fn available(mut self, qty: f64) -> Self {
        self.available = qty;
        self
    }

    pub fn used(mut self, qty: f64) -> Self {
        self.used = qty;
        self
    }

    pub fn in_transit(mut self, qty: f64) -> Self {
        self.in_transit = qty;
        self
    }

    pub fn invoiced(mut self, qty: f64) -> Self {
        self.invoiced = qty;
        self
    }
}

pub fn create_project(state: &AppState, name: &str) -> Result<Project, Box<dyn Error>> {
    Ok(state.project_repo.create_project(name, None)?)
}

/// 新增机器并写入零件需求、库存与订单
pub fn seed_machine(
    state: &AppState,
    project_id: &str,
    name: &str,
    parts: &[PartSeed],
) -> Result<ProjectMachine, Box<dyn Error>> {
    let machine = state.project_repo.add_machine(project_id, name, None, None)?;

    for (idx, part) in parts.iter().enumerate() {
        state.project_repo.upsert_machine_part(&MachinePartRequirement {
            machine_id: machine.id.clone(),
            part_number: part.part_number.to_string(),
            description: None,
            quantity_required: part.required,
            quantity_used: part.used,
        })?;

        if part.available > 0.0 {
            state.supply_repo.upsert_stock(part.part_number, part.available)?;
        }

        for (status, qty, suffix) in [
            (OrderStatus::Backorder, part.in_transit, "BO"),
            (OrderStatus::Invoiced, part.invoiced, "INV"),
        ] {
            if qty <= 0.0 {
                continue;
            }
            let order_number = format!("SO-{}-{}-{}", &machine.id[..8], idx, suffix);
            state.project_repo.add_machine_order_number(&machine.id, &order_number)?;
            state.supply_repo.upsert_order_line(&OrderLine {
                order_number,
                part_number: part.part_number.to_string(),
                quantity: qty,
                status,
                eta: Some("2026-12-01".to_string()),
            })?;
        }
    }

    Ok(machine)
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}
