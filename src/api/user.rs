use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};

use super::extract::{Json, Path};
use crate::{
    clock::Clock,
    content::{Credentials, User, UserInput, UserPatch, user::authenticate},
    error::{Error, Result},
    state::AppState,
    storage::{Db, UserRepository},
};

/// 配置用户相关路由。
///
/// - `GET|POST /users`
/// - `GET|PATCH|DELETE /users/{id}`
/// - `POST /auth/verify`：校验用户名和密码
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/users", get(user_list).post(user_create))
        .route(
            "/users/{id}",
            get(user_get).patch(user_update).delete(user_delete),
        )
        .route("/auth/verify", post(auth_verify))
}

async fn user_list(State(pool): State<Db>) -> Result<Json<Vec<User>>> {
    Ok(Json(pool.list_users().await?))
}

async fn user_get(Path(id): Path<i32>, State(pool): State<Db>) -> Result<Json<User>> {
    let user = pool.get_user(id).await?.ok_or(Error::NotFound("user"))?;
    Ok(Json(user))
}

async fn user_create(
    State(pool): State<Db>,
    State(clock): State<Arc<dyn Clock>>,
    Json(input): Json<UserInput>,
) -> Result<(StatusCode, Json<User>)> {
    input.validate()?;
    let user = pool.create_user(&input, clock.now()).await?;
    tracing::info!(user = user.id, username = %user.username, "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

async fn user_update(
    Path(id): Path<i32>,
    State(pool): State<Db>,
    State(clock): State<Arc<dyn Clock>>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>> {
    patch.validate()?;
    let user = pool
        .update_user(id, &patch, clock.now())
        .await?
        .ok_or(Error::NotFound("user"))?;
    Ok(Json(user))
}

async fn user_delete(Path(id): Path<i32>, State(pool): State<Db>) -> Result<StatusCode> {
    pool.delete_user(id).await?;
    tracing::info!(user = id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// 用户不存在、已停用或密码错误都返回同一个 [`Error::Unauthorized`]
async fn auth_verify(
    State(pool): State<Db>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<User>> {
    let user = pool.find_user_by_name(&credentials.username).await?;
    let user = authenticate(user, credentials.password)
        .await?
        .ok_or(Error::Unauthorized)?;
    Ok(Json(user))
}
