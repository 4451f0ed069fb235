use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get},
};

use super::extract::{Json, Path};
use crate::{
    clock::Clock,
    content::{DriveFile, NewDriveFile},
    error::Result,
    state::AppState,
    storage::{Db, DriveRepository},
};

/// 配置文件元数据路由。
///
/// - `GET|POST /drive`
/// - `DELETE /drive/{id}`
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/drive", get(file_list).post(file_create))
        .route("/drive/{id}", delete(file_delete))
}

async fn file_list(State(pool): State<Db>) -> Result<Json<Vec<DriveFile>>> {
    Ok(Json(pool.list_files().await?))
}

async fn file_create(
    State(pool): State<Db>,
    State(clock): State<Arc<dyn Clock>>,
    Json(file): Json<NewDriveFile>,
) -> Result<(StatusCode, Json<DriveFile>)> {
    file.validate()?;
    let file = pool.create_file(&file, clock.now()).await?;
    Ok((StatusCode::CREATED, Json(file)))
}

async fn file_delete(Path(id): Path<i32>, State(pool): State<Db>) -> Result<StatusCode> {
    pool.delete_file(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
