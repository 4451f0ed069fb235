pub mod api;
pub mod clock;
pub mod config;
pub mod content;
pub mod error;
pub mod remote;
pub mod state;
pub mod storage;

use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal};

use config::Config;
use error::Result;
use state::AppState;

/// 初始化日志，日志级别由 `SITECMS_LOG` 控制
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .with_env_filter(EnvFilter::from_env("SITECMS_LOG"))
        .init();
}

/// 加载配置，连接数据库并启动 HTTP 服务
pub async fn run() -> Result<()> {
    init_tracing();

    let config = Config::load()?;
    let pool = storage::new_db_pool(config.database_url()?).await?;
    let app = AppState::new(pool, &config)?;

    api::run_server(app, &config.bind).await
}
