use std::{collections::BTreeSet, sync::LazyLock};

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 用户角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type, Serialize, Deserialize)]
#[repr(i16)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin = 0,
    Editor = 1,
    #[default]
    Author = 2,
}

/// 后台用户
///
/// 密码哈希只在服务端使用，不会序列化输出。
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub nickname: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub enabled: bool,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UserInput {
    pub username: String,
    pub nickname: String,
    pub email: String,
    pub password: Option<String>,
    pub role: Role,
    pub enabled: bool,
}

impl Default for UserInput {
    fn default() -> Self {
        Self {
            username: String::new(),
            nickname: String::new(),
            email: String::new(),
            password: None,
            role: Role::default(),
            enabled: true,
        }
    }
}

impl UserInput {
    /// 校验新用户，创建时必须提供密码
    pub fn validate(&self) -> Result<()> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        match &self.password {
            Some(password) => validate_password(password),
            None => Err(Error::bad_request("password is required")),
        }
    }
}

fn validate_username(username: &str) -> Result<()> {
    let valid_chars = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !(3..=32).contains(&username.len()) || !valid_chars {
        return Err(Error::bad_request(
            "username must be 3-32 characters of letters, digits, '_', '-' or '.'",
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<()> {
    if !email.is_empty() && !email.contains('@') {
        return Err(Error::bad_request("invalid email address"));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < 8 {
        return Err(Error::bad_request("password must be at least 8 characters"));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserField {
    Username,
    Nickname,
    Email,
    Password,
    Role,
    Enabled,
}

/// 部分更新，只写入 `fields` 中列出的字段
#[derive(Debug, Clone, Deserialize)]
pub struct UserPatch {
    pub fields: Vec<UserField>,
    #[serde(default)]
    pub user: UserInput,
}

impl UserPatch {
    pub fn changed(&self) -> BTreeSet<UserField> {
        self.fields.iter().copied().collect()
    }

    pub fn validate(&self) -> Result<()> {
        let changed = self.changed();
        if changed.is_empty() {
            return Err(Error::bad_request("no fields to update"));
        }
        if changed.contains(&UserField::Username) {
            validate_username(&self.user.username)?;
        }
        if changed.contains(&UserField::Email) {
            validate_email(&self.user.email)?;
        }
        if changed.contains(&UserField::Password) {
            match &self.user.password {
                Some(password) => validate_password(password)?,
                None => return Err(Error::bad_request("password is required")),
            }
        }
        Ok(())
    }
}

/// 登录校验请求
#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// 使用 argon2 生成密码哈希
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// 用户名不存在时参与校验的占位哈希
static PLACEHOLDER_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("placeholder for unknown users").ok());

/// 在阻塞线程池中生成密码哈希
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| Error::PasswordHash(e.to_string()))?
}

/// 校验登录凭据，通过时返回用户
///
/// argon2 在阻塞线程池中运行。用户不存在时仍对占位哈希做一次校验，
/// 响应耗时不暴露用户名是否存在。
pub async fn authenticate(user: Option<User>, password: String) -> Result<Option<User>> {
    let hash = user.as_ref().map(|u| u.password_hash.clone());
    let matched = tokio::task::spawn_blocking(move || match hash {
        Some(hash) => verify_password(&hash, &password),
        None => {
            if let Some(placeholder) = PLACEHOLDER_HASH.as_deref() {
                verify_password(placeholder, &password);
            }
            false
        }
    })
    .await
    .map_err(|e| Error::PasswordHash(e.to_string()))?;
    Ok(user.filter(|u| matched && u.enabled))
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(%e, "stored password hash is malformed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn user(password: &str, enabled: bool) -> User {
        let at = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        User {
            id: 1,
            username: "alice".into(),
            nickname: "Alice".into(),
            email: "alice@example.com".into(),
            password_hash: hash_password(password).unwrap(),
            role: Role::Editor,
            enabled,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_authenticate() {
        let found = authenticate(Some(user("long-enough", true)), "long-enough".into())
            .await
            .unwrap();
        assert_eq!(found.map(|u| u.id), Some(1));

        let wrong = authenticate(Some(user("long-enough", true)), "guess".into()).await;
        assert!(wrong.unwrap().is_none());

        let disabled = authenticate(Some(user("long-enough", false)), "long-enough".into()).await;
        assert!(disabled.unwrap().is_none());

        let unknown = authenticate(None, "long-enough".into()).await;
        assert!(unknown.unwrap().is_none());
    }

    #[test]
    fn test_placeholder_hash_is_real_argon2() {
        // 未知用户也要走一次完整的 argon2 校验
        let placeholder = PLACEHOLDER_HASH.as_deref().expect("占位哈希生成失败");
        assert!(PasswordHash::new(placeholder).is_ok());
        assert!(!verify_password(placeholder, "long-enough"));
    }

    #[tokio::test]
    async fn test_hash_password_blocking() {
        let hash = hash_password_blocking("correct horse".into()).await.unwrap();
        assert!(verify_password(&hash, "correct horse"));
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse").expect("哈希失败");
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "correct horse"));
        assert!(!verify_password(&hash, "wrong horse"));
        assert!(!verify_password("not-a-hash", "correct horse"));
    }

    #[test]
    fn test_input_validation() {
        let input: UserInput = serde_json::from_value(json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "s3cret-pass"
        }))
        .unwrap();
        assert!(input.validate().is_ok());
        assert_eq!(input.role, Role::Author);
        assert!(input.enabled);

        let mut bad = input.clone();
        bad.username = "a b".into();
        assert!(bad.validate().is_err());

        let mut bad = input.clone();
        bad.password = Some("short".into());
        assert!(bad.validate().is_err());

        let mut bad = input;
        bad.password = None;
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_patch_password_required_when_listed() {
        let patch: UserPatch = serde_json::from_value(json!({
            "fields": ["password"],
            "user": {}
        }))
        .unwrap();
        assert!(patch.validate().is_err());

        let patch: UserPatch = serde_json::from_value(json!({
            "fields": ["nickname", "role"],
            "user": { "nickname": "Al", "role": "editor" }
        }))
        .unwrap();
        assert!(patch.validate().is_ok());
        assert_eq!(patch.user.role, Role::Editor);
    }

    #[test]
    fn test_hash_not_serialized() {
        use chrono::TimeZone;

        let at = Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let user = User {
            id: 1,
            username: "alice".into(),
            nickname: "Alice".into(),
            email: String::new(),
            password_hash: "$argon2id$secret".into(),
            role: Role::Admin,
            enabled: true,
            created_at: at,
            updated_at: at,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(value["role"], "admin");
    }
}
