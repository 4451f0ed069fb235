use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    clock::{Clock, SystemClock},
    config::Config,
    content::PluginRegistry,
    error::Result,
    remote::{HttpTranslator, Revalidator},
    storage::Db,
};

/// 应用程序上下文
///
/// [`AppState`] 封装了数据库连接池、外部服务客户端、时钟和插件注册表，
/// 各字段可以通过 [`axum::extract::State`] 单独提取。
#[derive(Clone, FromRef)]
pub struct AppState {
    pub pool: Db,
    pub translator: HttpTranslator,
    pub revalidator: Revalidator,
    pub clock: Arc<dyn Clock>,
    pub plugins: Arc<PluginRegistry>,
}

impl AppState {
    /// 按配置创建外部服务客户端，使用系统时钟和内置插件
    pub fn new(pool: Db, config: &Config) -> Result<Self> {
        Ok(Self {
            pool,
            translator: HttpTranslator::new(&config.translate)?,
            revalidator: Revalidator::new(&config.revalidate)?,
            clock: Arc::new(SystemClock),
            plugins: Arc::new(PluginRegistry::builtin()),
        })
    }

    /// 替换时钟，测试中用于固定时间
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }
}
