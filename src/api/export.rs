// ==========================================
// 供应链跟踪系统 - 摘要导出
// ==========================================
// 职责: 将项目摘要导出为表格可直接打开的 CSV
// 格式: 每台机器一行 + 项目合计一行；百分比保留两位小数
// ==========================================

use std::io::Write;

use csv::Writer;

use crate::api::error::ApiResult;
use crate::domain::analytics::ProjectSummary;
use crate::i18n::t;

pub const SUMMARY_CSV_HEADER: [&str; 8] = [
    "machine_id",
    "machine_name",
    "total_parts",
    "availability_percentage",
    "usage_percentage",
    "transit_percentage",
    "invoiced_percentage",
    "missing_percentage",
];

pub const PARTS_CSV_HEADER: [&str; 10] = [
    "machine_name",
    "part_number",
    "description",
    "quantity_required",
    "quantity_available",
    "quantity_used",
    "quantity_in_transit",
    "quantity_invoiced",
    "quantity_missing",
    "latest_eta",
];

fn fmt_pct(value: f64) -> String {
    format!("{:.2}", value)
}

fn fmt_qty(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

/// 写出项目摘要（机器行 + 项目合计行）
///
/// 合计行的 total_parts 列为跨机器去重后的零件数
pub fn write_project_summary_csv<W: Write>(summary: &ProjectSummary, writer: W) -> ApiResult<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(SUMMARY_CSV_HEADER)?;

    for machine in &summary.machines {
        wtr.write_record([
            machine.machine_id.clone(),
            machine.machine_name.clone(),
            machine.total_parts.to_string(),
            fmt_pct(machine.availability_percentage),
            fmt_pct(machine.usage_percentage),
            fmt_pct(machine.transit_percentage),
            fmt_pct(machine.invoiced_percentage),
            fmt_pct(machine.missing_percentage),
        ])?;
    }

    wtr.write_record([
        String::new(),
        t("export.project_total"),
        summary.total_unique_parts.to_string(),
        fmt_pct(summary.availability_percentage),
        fmt_pct(summary.usage_percentage),
        fmt_pct(summary.transit_percentage),
        fmt_pct(summary.invoiced_percentage),
        fmt_pct(summary.missing_percentage),
    ])?;

    wtr.flush()?;
    tracing::debug!(
        project_id = %summary.project_id,
        machines = summary.machines.len(),
        "项目摘要已导出为 CSV"
    );
    Ok(())
}

/// 写出零件明细（每台机器每个零件一行）
pub fn write_parts_detail_csv<W: Write>(summary: &ProjectSummary, writer: W) -> ApiResult<()> {
    let mut wtr = Writer::from_writer(writer);
    wtr.write_record(PARTS_CSV_HEADER)?;

    for machine in &summary.machines {
        for part in &machine.parts_details {
            wtr.write_record([
                machine.machine_name.clone(),
                part.part_number.clone(),
                part.description.clone().unwrap_or_default(),
                fmt_qty(part.quantity_required),
                fmt_qty(part.quantity_available),
                fmt_qty(part.quantity_used),
                fmt_qty(part.quantity_in_transit),
                fmt_qty(part.quantity_invoiced),
                fmt_qty(part.quantity_missing),
                part.latest_eta.clone().unwrap_or_default(),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

/// 项目摘要 CSV 字符串
pub fn project_summary_to_csv_string(summary: &ProjectSummary) -> ApiResult<String> {
    let mut buf = Vec::new();
    write_project_summary_csv(summary, &mut buf)?;
    String::from_utf8(buf).map_err(|e| crate::api::error::ApiError::ExportError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(fmt_pct(62.5), "62.50");
        assert_eq!(fmt_pct(100.0 / 3.0), "33.33");
        assert_eq!(fmt_qty(4.0), "4");
        assert_eq!(fmt_qty(2.25), "2.25");
    }
}
