use std::io;

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

pub type Result<T> = core::result::Result<T, Error>;

/// 统一错误类型
///
/// 每个变体都对应一个 HTTP 状态码和一个机器可读的 `kind`，
/// 见 [`Error::kind`]。
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// 资源不存在
    #[error("{0} not found")]
    NotFound(&'static str),

    /// 请求参数不合法
    #[error("{0}")]
    BadRequest(String),

    /// 用户名或密码错误
    #[error("invalid username or password")]
    Unauthorized,

    /// 与现有数据冲突，例如删除仍有文章的栏目
    #[error("{0}")]
    Conflict(String),

    /// 栏目层级数据损坏（环或层级过深）
    #[error("tab hierarchy integrity violation: {0}")]
    Integrity(String),

    /// 排序请求中包含不存在的栏目
    #[error("unknown tab ids: {0:?}")]
    UnknownTabs(Vec<i32>),

    /// 外部服务不可用或返回了异常结果
    #[error("{0}")]
    Upstream(String),

    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("password hash: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Error::BadRequest(msg.into())
    }

    /// 返回状态码和机器可读的错误类别
    pub fn kind(&self) -> (StatusCode, &'static str) {
        match self {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Error::BadRequest(_) | Error::Json(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Error::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            Error::Integrity(_) => (StatusCode::INTERNAL_SERVER_ERROR, "integrity"),
            Error::UnknownTabs(_) => (StatusCode::UNPROCESSABLE_ENTITY, "unknown_tabs"),
            Error::Upstream(_) | Error::Reqwest(_) => (StatusCode::BAD_GATEWAY, "bad_gateway"),
            Error::Sqlx(sqlx::Error::RowNotFound) => (StatusCode::NOT_FOUND, "not_found"),
            Error::Sqlx(e) => match e.as_database_error() {
                Some(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
                    (StatusCode::CONFLICT, "conflict")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
            Error::MissingConfig(_)
            | Error::PasswordHash(_)
            | Error::Config(_)
            | Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }

    /// 返回给调用方的错误信息，内部错误不暴露细节
    fn public_message(&self) -> String {
        match self {
            Error::Sqlx(sqlx::Error::RowNotFound) => "resource not found".to_string(),
            Error::Sqlx(e) => match e.as_database_error() {
                Some(db) if db.is_unique_violation() => "resource already exists".to_string(),
                Some(db) if db.is_foreign_key_violation() => {
                    "referenced resource is missing or still in use".to_string()
                }
                _ => "Internal Server Error".to_string(),
            },
            Error::Reqwest(_) => "Bad Gateway".to_string(),
            Error::MissingConfig(_)
            | Error::PasswordHash(_)
            | Error::Config(_)
            | Error::Io(_) => "Internal Server Error".to_string(),
            e => e.to_string(),
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Error::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for Error {
    fn from(rejection: PathRejection) -> Self {
        Error::BadRequest(rejection.body_text())
    }
}

impl From<axum_extra::extract::QueryRejection> for Error {
    fn from(rejection: axum_extra::extract::QueryRejection) -> Self {
        Error::BadRequest(rejection.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, kind) = self.kind();

        match &self {
            Error::Integrity(e) => tracing::error!(%e, "tab hierarchy integrity violation"),
            Error::Reqwest(e) => tracing::warn!(%e, "upstream request failed"),
            e if status.is_server_error() => tracing::error!(%e, "internal error"),
            _ => {}
        }

        let body = ErrorBody {
            kind,
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::NotFound("tab").kind().1, "not_found");
        assert_eq!(Error::bad_request("x").kind().0, StatusCode::BAD_REQUEST);
        assert_eq!(
            Error::Integrity("cycle".into()).kind(),
            (StatusCode::INTERNAL_SERVER_ERROR, "integrity")
        );
        assert_eq!(Error::UnknownTabs(vec![4]).kind().1, "unknown_tabs");
        assert_eq!(
            Error::Sqlx(sqlx::Error::RowNotFound).kind().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Sqlx(sqlx::Error::PoolTimedOut).kind().1,
            "internal"
        );
    }

    #[test]
    fn test_internal_message_hidden() {
        let msg = Error::Sqlx(sqlx::Error::PoolTimedOut).public_message();
        assert_eq!(msg, "Internal Server Error");

        let msg = Error::UnknownTabs(vec![4, 9]).public_message();
        assert_eq!(msg, "unknown tab ids: [4, 9]");
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let resp = Error::Conflict("tab still has articles".into()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("读取数据失败");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("反序列化失败");
        assert_eq!(json["kind"], "conflict");
        assert_eq!(json["message"], "tab still has articles");
    }
}
