use chrono::{DateTime, Local};
use serde_json::Value;

use super::{Db, PluginRecord};
use crate::error::{Error, Result};

/// 插件配置的数据库操作接口
///
/// 只负责存取，配置校验和密钥遮蔽由 [`crate::content::PluginRegistry`] 完成。
pub trait PluginRepository: Send + Sync {
    fn list_plugins(&self) -> impl Future<Output = Result<Vec<PluginRecord>>> + Send;

    fn get_plugin(&self, id: &str) -> impl Future<Output = Result<Option<PluginRecord>>> + Send;

    fn save_plugin(
        &self,
        id: &str,
        enabled: bool,
        config: &Value,
        now: DateTime<Local>,
    ) -> impl Future<Output = Result<PluginRecord>> + Send;

    fn delete_plugin(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
}

impl PluginRepository for Db {
    async fn list_plugins(&self) -> Result<Vec<PluginRecord>> {
        Ok(
            sqlx::query_as::<_, PluginRecord>("SELECT * FROM plugins ORDER BY id")
                .fetch_all(self)
                .await?,
        )
    }

    async fn get_plugin(&self, id: &str) -> Result<Option<PluginRecord>> {
        Ok(
            sqlx::query_as::<_, PluginRecord>("SELECT * FROM plugins WHERE id = $1")
                .bind(id)
                .fetch_optional(self)
                .await?,
        )
    }

    async fn save_plugin(
        &self,
        id: &str,
        enabled: bool,
        config: &Value,
        now: DateTime<Local>,
    ) -> Result<PluginRecord> {
        let record = sqlx::query_as::<_, PluginRecord>(
            r#"
            INSERT INTO plugins (id, enabled, config, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                config = EXCLUDED.config,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(enabled)
        .bind(config)
        .bind(now)
        .fetch_one(self)
        .await?;
        Ok(record)
    }

    async fn delete_plugin(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM plugins WHERE id = $1")
            .bind(id)
            .execute(self)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("plugin"));
        }
        Ok(())
    }
}
