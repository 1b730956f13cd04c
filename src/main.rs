// ==========================================
// 供应链跟踪系统 - 命令行入口
// ==========================================
// 职责: 解析命令行参数，初始化 AppState，调用 API 并输出 JSON/CSV
// ==========================================

use std::error::Error;
use std::io::Write;

use clap::{Parser, Subcommand};
use supply_tracker::api::{write_parts_detail_csv, write_project_summary_csv};
use supply_tracker::app::{get_default_db_path, AppState};

#[derive(Parser, Debug)]
#[command(name = "supply-tracker", version, about = "项目物料分析")]
struct Cli {
    /// 数据库文件路径（默认: SUPPLY_TRACKER_DB_PATH 或用户数据目录）
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 列出项目
    Projects,
    /// 项目摘要（默认输出 JSON）
    Summary {
        project_id: String,
        /// 输出机器汇总 CSV（含项目合计行）
        #[arg(long, conflicts_with = "parts_csv")]
        csv: bool,
        /// 输出零件明细 CSV
        #[arg(long)]
        parts_csv: bool,
    },
    /// 单台机器明细
    Machine { project_id: String, machine_id: String },
    /// 多项目对比
    Compare {
        #[arg(required = true, num_args = 1..)]
        project_ids: Vec<String>,
    },
    /// 手动刷新分析视图
    Refresh { project_id: String },
    /// 查询零件库存
    Stock { part_number: String },
    /// 查询订单行
    Orders { order_number: String },
    /// 写入全局配置并输出配置快照
    Config { key: String, value: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    supply_tracker::logging::init();

    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    tracing::info!("{} v{}", supply_tracker::APP_NAME, supply_tracker::VERSION);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(db_path)?;
    state.apply_locale().await;

    let stdout = std::io::stdout();
    match cli.command {
        Command::Projects => {
            let projects = state.project_repo.list_projects()?;
            println!("{}", serde_json::to_string_pretty(&projects)?);
        }
        Command::Summary {
            project_id,
            csv,
            parts_csv,
        } => {
            let response = state.project_analytics_api.get_project_summary(&project_id).await?;
            if let Some(warning) = &response.warning {
                eprintln!("warning: {}", warning);
            }
            if csv {
                write_project_summary_csv(&response.summary, stdout.lock())?;
            } else if parts_csv {
                write_parts_detail_csv(&response.summary, stdout.lock())?;
            } else {
                println!("{}", serde_json::to_string_pretty(&response)?);
            }
        }
        Command::Machine {
            project_id,
            machine_id,
        } => {
            let machine = state
                .project_analytics_api
                .get_machine_summary(&project_id, &machine_id)
                .await?;
            println!("{}", serde_json::to_string_pretty(&machine)?);
        }
        Command::Compare { project_ids } => {
            let rows = state.project_analytics_api.compare_projects(&project_ids).await?;
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
        Command::Refresh { project_id } => {
            let refresh_id = state
                .project_analytics_api
                .refresh_analytics(&project_id, Some("supply-tracker cli".to_string()))
                .await?;
            println!("refresh_id={}", refresh_id);
        }
        Command::Stock { part_number } => {
            let available = state.supply_repo.get_stock(&part_number)?;
            let body = serde_json::json!({
                "part_number": part_number,
                "quantity_available": available,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Orders { order_number } => {
            let lines = state.supply_repo.list_order_lines(&order_number)?;
            println!("{}", serde_json::to_string_pretty(&lines)?);
        }
        Command::Config { key, value } => {
            state
                .config_manager
                .set_global_config_value(&key, &value)
                .map_err(|e| e.to_string())?;
            println!("{}", state.config_manager.get_config_snapshot().map_err(|e| e.to_string())?);
        }
    }

    stdout.lock().flush()?;
    Ok(())
}
