mod article;
mod drive;
mod extract;
mod plugin;
mod revalidate;
mod tab;
mod user;
mod website;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::instrument;

use crate::{error::Result, state::AppState};

/// 设置应用的路由。
///
/// 将 `/api` 下各资源的接口组合在一起，并绑定应用状态。
pub fn setup_route(app: AppState) -> Router {
    let api = Router::new()
        .merge(tab::setup_route())
        .merge(article::setup_route())
        .merge(user::setup_route())
        .merge(website::setup_route())
        .merge(plugin::setup_route())
        .merge(revalidate::setup_route())
        .merge(drive::setup_route());

    Router::new().nest("/api", api).with_state(app)
}

/// 在 `bind` 上监听 TCP 连接并处理请求。
#[instrument(name = "http server", skip(router))]
pub async fn run_server_with_router(router: Router, bind: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router).await?;
    Ok(())
}

/// 启动 HTTP 服务，自动设置路由和中间件。
///
/// 1. 生成路由
/// 2. 添加日志和追踪中间件
/// 3. 启动服务器
pub async fn run_server(app: AppState, bind: &str) -> Result<()> {
    let router = setup_route(app);
    let router = add_middlewares(router);
    run_server_with_router(router, bind).await
}

/// 为路由添加中间件，包括请求追踪和失败日志记录。
fn add_middlewares(router: Router) -> Router {
    fn log_failure(
        err: tower_http::classify::ServerErrorsFailureClass,
        latency: std::time::Duration,
        _span: &tracing::Span,
    ) {
        tracing::error!(error = %err, ?latency, "request failed");
    }

    router.layer(
        TraceLayer::new_for_http()
            .on_failure(log_failure)
            .on_request(|_req: &_, _span: &tracing::Span| {
                // 空实现，关闭请求日志
            }),
    )
}
