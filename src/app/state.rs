// ==========================================
// 供应链跟踪系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::analytics::services::{
    AnalyticsFetcher, AnalyticsRefreshService, AnalyticsViewRefresher, ProjectChangeNotifier,
};
use crate::api::ProjectAnalyticsApi;
use crate::config::{AnalyticsConfigReader, ConfigManager};
use crate::engine::events::ProjectDataEventPublisher;
use crate::repository::{AnalyticsRefreshRepository, AnalyticsRepository, ProjectRepository, SupplyRepository};

/// 应用状态
///
/// 所有仓储共享同一个 SQLite 连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 共享连接
    pub conn: Arc<Mutex<Connection>>,

    /// 项目分析API
    pub project_analytics_api: Arc<ProjectAnalyticsApi>,

    /// 项目仓储（写操作发布变更事件）
    pub project_repo: Arc<ProjectRepository>,

    /// 库存与订单仓储（写操作向引用零件的项目发布 SupplyChanged）
    pub supply_repo: Arc<SupplyRepository>,

    /// 分析视图刷新服务
    pub refresh_service: Arc<AnalyticsRefreshService>,

    /// 刷新日志仓储
    pub refresh_log_repo: Arc<AnalyticsRefreshRepository>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 项目变更通知（订阅后接收 ProjectDataEvent）
    pub change_notifier: Arc<ProjectChangeNotifier>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（":memory:" 表示内存库）
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = if db_path == ":memory:" {
            crate::db::open_in_memory_shared()
        } else {
            crate::db::open_shared_connection(&db_path)
        }
        .map_err(|e| format!("无法打开数据库: {}", e))?;

        {
            let guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::ensure_schema_version(&guard)
                .map_err(|e| format!("schema_version 初始化失败: {}", e))?;
        }

        Self::from_connection(db_path, conn)
    }

    /// 从已有连接创建（测试/工具复用）
    pub fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Result<Self, String> {
        let change_notifier = Arc::new(ProjectChangeNotifier::new());
        let publisher: Arc<dyn ProjectDataEventPublisher> = change_notifier.clone();

        // ==========================================
        // 初始化Repository层
        // ==========================================
        let project_repo = Arc::new(
            ProjectRepository::with_publisher(conn.clone(), publisher.clone())
                .map_err(|e| format!("无法创建ProjectRepository: {}", e))?,
        );
        let supply_repo = Arc::new(
            SupplyRepository::with_publisher(conn.clone(), publisher.clone())
                .map_err(|e| format!("无法创建SupplyRepository: {}", e))?,
        );
        let analytics_repo = Arc::new(
            AnalyticsRepository::new(conn.clone())
                .map_err(|e| format!("无法创建AnalyticsRepository: {}", e))?,
        );
        let refresh_log_repo = Arc::new(AnalyticsRefreshRepository::new(conn.clone()));

        // ==========================================
        // 初始化服务层
        // ==========================================
        let config_manager = Arc::new(
            ConfigManager::from_connection(conn.clone())
                .map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config_reader: Arc<dyn AnalyticsConfigReader> = config_manager.clone();

        let log_retention_days = config_manager
            .refresh_log_retention_days()
            .map_err(|e| format!("读取刷新日志保留天数失败: {}", e))?;
        let refresh_service = Arc::new(
            AnalyticsRefreshService::with_publisher(conn.clone(), publisher)
                .map_err(|e| format!("无法创建AnalyticsRefreshService: {}", e))?
                .with_log_retention_days(log_retention_days),
        );
        let refresher: Arc<dyn AnalyticsViewRefresher> = refresh_service.clone();

        let fetcher = Arc::new(AnalyticsFetcher::new(
            project_repo.clone(),
            analytics_repo,
            refresher.clone(),
        ));

        // ==========================================
        // 创建API实例
        // ==========================================
        let project_analytics_api = Arc::new(ProjectAnalyticsApi::new(
            project_repo.clone(),
            fetcher,
            refresher,
            config_reader,
        ));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            conn,
            project_analytics_api,
            project_repo,
            supply_repo,
            refresh_service,
            refresh_log_repo,
            config_manager,
            change_notifier,
        })
    }

    /// 按配置设置界面语言
    pub async fn apply_locale(&self) {
        match self.config_manager.get_locale().await {
            Ok(locale) => {
                crate::i18n::set_locale(&locale);
                tracing::debug!("界面语言: {}", locale);
            }
            Err(e) => tracing::warn!("读取界面语言失败，保持默认: {}", e),
        }
    }
}

/// 获取默认数据库路径
///
/// 优先使用环境变量 SUPPLY_TRACKER_DB_PATH，否则放在用户数据目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("SUPPLY_TRACKER_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./supply_tracker.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        let dir = if cfg!(debug_assertions) {
            data_dir.join("supply-tracker-dev")
        } else {
            data_dir.join("supply-tracker")
        };

        // best-effort: 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("supply_tracker.db");
        }
    }

    path.to_string_lossy().to_string()
}
