// ==========================================
// 供应链跟踪系统 - 分析配置读取 Trait
// ==========================================
// 职责: 定义分析模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::SharedPartMerge;
use async_trait::async_trait;
use std::error::Error;

// ==========================================
// AnalyticsConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait AnalyticsConfigReader: Send + Sync {
    /// 读取摘要前是否刷新分析视图
    ///
    /// # 默认值
    /// - true
    async fn get_refresh_before_read(&self) -> Result<bool, Box<dyn Error + Send + Sync>>;

    /// 跨机器共享零件的库存/在途/开票合并口径
    ///
    /// # 默认值
    /// - FIRST_WINS
    async fn get_shared_part_merge(&self) -> Result<SharedPartMerge, Box<dyn Error + Send + Sync>>;

    /// 界面语言（zh-CN / en）
    ///
    /// # 默认值
    /// - zh-CN
    async fn get_locale(&self) -> Result<String, Box<dyn Error + Send + Sync>>;
}
