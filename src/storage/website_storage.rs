use chrono::{DateTime, Local};

use super::Db;
use crate::{content::Website, error::Result};

/// 站点设置的数据库操作接口
pub trait WebsiteRepository: Send + Sync {
    /// 尚未保存过设置时返回 `None`
    fn get_website(&self) -> impl Future<Output = Result<Option<Website>>> + Send;

    fn save_website(
        &self,
        website: &Website,
        now: DateTime<Local>,
    ) -> impl Future<Output = Result<Website>> + Send;
}

impl WebsiteRepository for Db {
    async fn get_website(&self) -> Result<Option<Website>> {
        let website = sqlx::query_as::<_, Website>("SELECT * FROM website WHERE id = 1")
            .fetch_optional(self)
            .await?;
        Ok(website)
    }

    async fn save_website(&self, website: &Website, now: DateTime<Local>) -> Result<Website> {
        let website = sqlx::query_as::<_, Website>(
            r#"
            INSERT INTO website
                (id, title, subtitle, description, keywords, logo, favicon, copyright, meta, updated_at)
            VALUES (1, $1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                subtitle = EXCLUDED.subtitle,
                description = EXCLUDED.description,
                keywords = EXCLUDED.keywords,
                logo = EXCLUDED.logo,
                favicon = EXCLUDED.favicon,
                copyright = EXCLUDED.copyright,
                meta = EXCLUDED.meta,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(&website.title)
        .bind(&website.subtitle)
        .bind(&website.description)
        .bind(&website.keywords)
        .bind(&website.logo)
        .bind(&website.favicon)
        .bind(&website.copyright)
        .bind(&website.meta)
        .bind(now)
        .fetch_one(self)
        .await?;
        Ok(website)
    }
}
