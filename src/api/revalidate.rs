use axum::{Router, extract::State, routing::post};
use serde::{Deserialize, Serialize};

use super::extract::Json;
use crate::{
    error::{Error, Result},
    remote::Revalidator,
    state::AppState,
    storage::Db,
};

/// `POST /revalidate`：手动触发前台页面重新生成
pub fn setup_route() -> Router<AppState> {
    Router::new().route("/revalidate", post(revalidate))
}

#[derive(Debug, Deserialize, Serialize)]
struct RevalidatePath {
    path: String,
}

async fn revalidate(
    State(pool): State<Db>,
    State(revalidator): State<Revalidator>,
    Json(body): Json<RevalidatePath>,
) -> Result<Json<RevalidatePath>> {
    if body.path.trim().is_empty() {
        return Err(Error::bad_request("path must not be empty"));
    }
    let site = revalidator
        .site(&pool)
        .await?
        .ok_or_else(|| Error::bad_request("nextjs plugin is not configured"))?;

    revalidator.revalidate(&site, &body.path).await?;
    Ok(Json(body))
}
