use chrono::{DateTime, Local};
use sqlx::{Postgres, QueryBuilder};

use super::Db;
use crate::{
    content::{User, UserField, UserInput, UserPatch, user::hash_password_blocking},
    error::{Error, Result},
};

/// 用户的数据库操作接口
pub trait UserRepository: Send + Sync {
    fn list_users(&self) -> impl Future<Output = Result<Vec<User>>> + Send;

    fn get_user(&self, id: i32) -> impl Future<Output = Result<Option<User>>> + Send;

    fn find_user_by_name(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<Option<User>>> + Send;

    fn create_user(
        &self,
        input: &UserInput,
        now: DateTime<Local>,
    ) -> impl Future<Output = Result<User>> + Send;

    fn update_user(
        &self,
        id: i32,
        patch: &UserPatch,
        now: DateTime<Local>,
    ) -> impl Future<Output = Result<Option<User>>> + Send;

    fn delete_user(&self, id: i32) -> impl Future<Output = Result<()>> + Send;
}

impl UserRepository for Db {
    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id")
            .fetch_all(self)
            .await?)
    }

    async fn get_user(&self, id: i32) -> Result<Option<User>> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self)
            .await?)
    }

    async fn find_user_by_name(&self, username: &str) -> Result<Option<User>> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
                .bind(username)
                .fetch_optional(self)
                .await?,
        )
    }

    async fn create_user(&self, input: &UserInput, now: DateTime<Local>) -> Result<User> {
        let password = input
            .password
            .as_deref()
            .ok_or_else(|| Error::bad_request("password is required"))?;
        let password_hash = hash_password_blocking(password.to_string()).await?;

        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (username, nickname, email, password_hash, role, enabled, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *
            "#,
        )
        .bind(&input.username)
        .bind(&input.nickname)
        .bind(&input.email)
        .bind(password_hash)
        .bind(input.role)
        .bind(input.enabled)
        .bind(now)
        .fetch_one(self)
        .await?;
        Ok(user)
    }

    async fn update_user(
        &self,
        id: i32,
        patch: &UserPatch,
        now: DateTime<Local>,
    ) -> Result<Option<User>> {
        let password_hash = if patch.changed().contains(&UserField::Password) {
            let password = patch
                .user
                .password
                .clone()
                .ok_or_else(|| Error::bad_request("password is required"))?;
            Some(hash_password_blocking(password).await?)
        } else {
            None
        };
        let mut builder = update_user_query(id, patch, password_hash, now)?;
        Ok(builder
            .build_query_as::<User>()
            .fetch_optional(self)
            .await?)
    }

    async fn delete_user(&self, id: i32) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("user"));
        }
        Ok(())
    }
}

/// 生成部分更新语句，密码字段写入预先算好的 `password_hash`
pub fn update_user_query(
    id: i32,
    patch: &UserPatch,
    password_hash: Option<String>,
    now: DateTime<Local>,
) -> Result<QueryBuilder<'static, Postgres>> {
    let u = &patch.user;
    let mut builder = QueryBuilder::new("UPDATE users SET ");

    let mut set = builder.separated(", ");
    for field in patch.changed() {
        match field {
            UserField::Username => {
                set.push("username = ").push_bind_unseparated(u.username.clone());
            }
            UserField::Nickname => {
                set.push("nickname = ").push_bind_unseparated(u.nickname.clone());
            }
            UserField::Email => {
                set.push("email = ").push_bind_unseparated(u.email.clone());
            }
            UserField::Password => {
                let hash = password_hash
                    .clone()
                    .ok_or_else(|| Error::bad_request("password is required"))?;
                set.push("password_hash = ").push_bind_unseparated(hash);
            }
            UserField::Role => {
                set.push("role = ").push_bind_unseparated(u.role);
            }
            UserField::Enabled => {
                set.push("enabled = ").push_bind_unseparated(u.enabled);
            }
        }
    }
    set.push("updated_at = ").push_bind_unseparated(now);

    builder.push(" WHERE id = ").push_bind(id);
    builder.push(" RETURNING *");
    Ok(builder)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_update_query_writes_password_hash() {
        let patch: UserPatch = serde_json::from_value(json!({
            "fields": ["password", "nickname"],
            "user": { "nickname": "Al", "password": "long-enough" }
        }))
        .unwrap();
        let now = Local.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let builder = update_user_query(3, &patch, Some("$argon2id$stub".into()), now).unwrap();
        assert_eq!(
            builder.sql(),
            "UPDATE users SET nickname = $1, password_hash = $2, updated_at = $3 \
             WHERE id = $4 RETURNING *"
        );
    }

    #[test]
    fn test_update_query_requires_password() {
        let patch: UserPatch =
            serde_json::from_value(json!({ "fields": ["password"], "user": {} })).unwrap();
        let now = Local.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(update_user_query(3, &patch, None, now).is_err());
    }
}
