use std::sync::Arc;

use axum::{Router, extract::State, routing::get};

use super::extract::Json;
use crate::{
    clock::Clock,
    content::Website,
    error::Result,
    state::AppState,
    storage::{Db, WebsiteRepository},
};

/// `GET|PUT /website`：站点设置
pub fn setup_route() -> Router<AppState> {
    Router::new().route("/website", get(website_get).put(website_put))
}

/// 尚未保存时返回默认设置
async fn website_get(State(pool): State<Db>) -> Result<Json<Website>> {
    Ok(Json(pool.get_website().await?.unwrap_or_default()))
}

async fn website_put(
    State(pool): State<Db>,
    State(clock): State<Arc<dyn Clock>>,
    Json(website): Json<Website>,
) -> Result<Json<Website>> {
    let website = website.normalized()?;
    Ok(Json(pool.save_website(&website, clock.now()).await?))
}
