use chrono::{DateTime, Local};
use serde::Deserialize;
use sqlx::{PgConnection, Postgres, QueryBuilder};

use super::{ArticleRow, Db};
use crate::{
    content::{Article, ArticleField, ArticleInput, ArticlePatch, ArticleStatus},
    error::{Error, Result},
};

/// 文章查询语句，连接三个关联栏目以便计算链接
const SELECT_ARTICLE: &str = r#"
    SELECT a.*,
           t1.layout AS tab_layout, t1.url AS tab_url,
           t2.layout AS tab2_layout, t2.url AS tab2_url,
           t3.layout AS tab3_layout, t3.url AS tab3_url
    FROM articles a
    LEFT JOIN tabs t1 ON t1.id = a.tab_id
    LEFT JOIN tabs t2 ON t2.id = a.tab_id2
    LEFT JOIN tabs t3 ON t3.id = a.tab_id3
"#;

/// 文章列表的查询参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArticleFilter {
    pub page: i64,
    pub limit: i64,
    /// 任一关联栏目等于该 id
    pub tab: Option<i32>,
    pub status: Option<ArticleStatus>,
}

impl Default for ArticleFilter {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            tab: None,
            status: None,
        }
    }
}

/// 文章的数据库操作接口
///
/// 写操作先按 id 顺序锁定受影响的栏目行，再在同一事务中重新统计它们的 `article_count`。
pub trait ArticleRepository: Send + Sync {
    fn list_articles(
        &self,
        filter: &ArticleFilter,
    ) -> impl Future<Output = Result<Vec<ArticleRow>>> + Send;

    fn get_article(&self, id: i32) -> impl Future<Output = Result<Option<ArticleRow>>> + Send;

    fn create_article(
        &self,
        input: &ArticleInput,
        now: DateTime<Local>,
    ) -> impl Future<Output = Result<ArticleRow>> + Send;

    /// 部分更新，文章不存在时返回 [`Error::NotFound`]
    fn update_article(
        &self,
        id: i32,
        patch: &ArticlePatch,
        now: DateTime<Local>,
    ) -> impl Future<Output = Result<ArticleRow>> + Send;

    fn delete_article(&self, id: i32) -> impl Future<Output = Result<()>> + Send;
}

impl ArticleRepository for Db {
    async fn list_articles(&self, filter: &ArticleFilter) -> Result<Vec<ArticleRow>> {
        let mut builder = list_articles_query(filter);
        let rows = builder
            .build_query_as::<ArticleRow>()
            .fetch_all(self)
            .await?;
        Ok(rows)
    }

    async fn get_article(&self, id: i32) -> Result<Option<ArticleRow>> {
        let sql = format!("{SELECT_ARTICLE} WHERE a.id = $1");
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(id)
            .fetch_optional(self)
            .await?;
        Ok(row)
    }

    async fn create_article(
        &self,
        input: &ArticleInput,
        now: DateTime<Local>,
    ) -> Result<ArticleRow> {
        let mut tx = self.begin().await?;

        lock_tabs(tx.as_mut(), &tab_list(input.tab_id, input.tab_id2, input.tab_id3)).await?;

        let (id, tab_id, tab_id2, tab_id3): (i32, i32, Option<i32>, Option<i32>) = sqlx::query_as(
            r#"
            INSERT INTO articles
                (tab_id, tab_id2, tab_id3, title, url, summary, content, cover, status, author_id,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING id, tab_id, tab_id2, tab_id3
            "#,
        )
        .bind(input.tab_id)
        .bind(input.tab_id2)
        .bind(input.tab_id3)
        .bind(input.title.trim())
        .bind(&input.url)
        .bind(&input.summary)
        .bind(&input.content)
        .bind(&input.cover)
        .bind(input.status)
        .bind(input.author_id)
        .bind(now)
        .fetch_one(tx.as_mut())
        .await?;

        recount_tabs(tx.as_mut(), &tab_list(tab_id, tab_id2, tab_id3)).await?;
        let row = fetch_row(tx.as_mut(), id).await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn update_article(
        &self,
        id: i32,
        patch: &ArticlePatch,
        now: DateTime<Local>,
    ) -> Result<ArticleRow> {
        let mut tx = self.begin().await?;

        let before = sqlx::query_as::<_, Article>(
            "SELECT * FROM articles WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or(Error::NotFound("article"))?;

        patch.validate(&before)?;

        let mut affected = before.tab_ids();
        affected.extend(patched_tab_ids(patch));
        lock_tabs(tx.as_mut(), &affected).await?;

        let mut builder = update_article_query(id, patch, now);
        builder.build().execute(tx.as_mut()).await?;

        let after = fetch_row(tx.as_mut(), id).await?;
        recount_tabs(tx.as_mut(), &affected).await?;

        tx.commit().await?;
        Ok(after)
    }

    async fn delete_article(&self, id: i32) -> Result<()> {
        let mut tx = self.begin().await?;

        let (tab_id, tab_id2, tab_id3): (i32, Option<i32>, Option<i32>) = sqlx::query_as(
            "SELECT tab_id, tab_id2, tab_id3 FROM articles WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or(Error::NotFound("article"))?;

        let affected = tab_list(tab_id, tab_id2, tab_id3);
        lock_tabs(tx.as_mut(), &affected).await?;

        sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(tx.as_mut())
            .await?;

        recount_tabs(tx.as_mut(), &affected).await?;

        tx.commit().await?;
        Ok(())
    }
}

fn tab_list(tab_id: i32, tab_id2: Option<i32>, tab_id3: Option<i32>) -> Vec<i32> {
    [Some(tab_id), tab_id2, tab_id3].into_iter().flatten().collect()
}

/// 更新后文章新关联的栏目，只看 `patch` 中列出的栏目字段
fn patched_tab_ids(patch: &ArticlePatch) -> Vec<i32> {
    let a = &patch.article;
    patch
        .changed()
        .into_iter()
        .filter_map(|field| match field {
            ArticleField::TabId => Some(a.tab_id),
            ArticleField::TabId2 => a.tab_id2,
            ArticleField::TabId3 => a.tab_id3,
            _ => None,
        })
        .collect()
}

/// 升序去重，所有事务按同一顺序加锁
fn lock_order(tab_ids: &[i32]) -> Vec<i32> {
    let mut ids = tab_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// 锁定栏目行
///
/// 同一栏目上的文章写入因此串行，之后的语句在 READ COMMITTED 下取新快照，
/// [`recount_tabs`] 能看到先提交事务写入的文章。
async fn lock_tabs(conn: &mut PgConnection, tab_ids: &[i32]) -> Result<()> {
    let ids = lock_order(tab_ids);
    if ids.is_empty() {
        return Ok(());
    }
    sqlx::query("SELECT id FROM tabs WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(&ids)
        .fetch_all(conn)
        .await?;
    Ok(())
}

async fn fetch_row(conn: &mut PgConnection, id: i32) -> Result<ArticleRow> {
    let sql = format!("{SELECT_ARTICLE} WHERE a.id = $1");
    let row = sqlx::query_as::<_, ArticleRow>(&sql)
        .bind(id)
        .fetch_one(conn)
        .await?;
    Ok(row)
}

/// 重新统计栏目的文章数，主栏目和次栏目都计入
async fn recount_tabs(conn: &mut PgConnection, tab_ids: &[i32]) -> Result<()> {
    if tab_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"
        UPDATE tabs
        SET article_count = (
            SELECT COUNT(*)
            FROM articles a
            WHERE a.tab_id = tabs.id OR a.tab_id2 = tabs.id OR a.tab_id3 = tabs.id
        )::INT4
        WHERE id = ANY($1)
        "#,
    )
    .bind(tab_ids)
    .execute(conn)
    .await?;
    Ok(())
}

/// 分页查询文章列表，最新的在前
pub fn list_articles_query(filter: &ArticleFilter) -> QueryBuilder<'static, Postgres> {
    let limit = filter.limit.clamp(1, 100);
    let offset = (filter.page.max(1) - 1) * limit;

    let mut builder = QueryBuilder::new(SELECT_ARTICLE);
    builder.push(" WHERE TRUE");
    if let Some(tab) = filter.tab {
        builder
            .push(" AND (a.tab_id = ")
            .push_bind(tab)
            .push(" OR a.tab_id2 = ")
            .push_bind(tab)
            .push(" OR a.tab_id3 = ")
            .push_bind(tab)
            .push(")");
    }
    if let Some(status) = filter.status {
        builder.push(" AND a.status = ").push_bind(status);
    }

    builder.push(" ORDER BY a.created_at DESC, a.id DESC");
    builder.push(" LIMIT ").push_bind(limit);
    builder.push(" OFFSET ").push_bind(offset);
    builder
}

/// 生成部分更新语句，只包含 `patch` 中列出的字段
pub fn update_article_query(
    id: i32,
    patch: &ArticlePatch,
    now: DateTime<Local>,
) -> QueryBuilder<'static, Postgres> {
    let a = &patch.article;
    let mut builder = QueryBuilder::new("UPDATE articles SET ");

    let mut set = builder.separated(", ");
    for field in patch.changed() {
        match field {
            ArticleField::TabId => {
                set.push("tab_id = ").push_bind_unseparated(a.tab_id);
            }
            ArticleField::TabId2 => {
                set.push("tab_id2 = ").push_bind_unseparated(a.tab_id2);
            }
            ArticleField::TabId3 => {
                set.push("tab_id3 = ").push_bind_unseparated(a.tab_id3);
            }
            ArticleField::Title => {
                set.push("title = ")
                    .push_bind_unseparated(a.title.trim().to_string());
            }
            ArticleField::Url => {
                set.push("url = ").push_bind_unseparated(a.url.clone());
            }
            ArticleField::Summary => {
                set.push("summary = ").push_bind_unseparated(a.summary.clone());
            }
            ArticleField::Content => {
                set.push("content = ").push_bind_unseparated(a.content.clone());
            }
            ArticleField::Cover => {
                set.push("cover = ").push_bind_unseparated(a.cover.clone());
            }
            ArticleField::Status => {
                set.push("status = ").push_bind_unseparated(a.status);
            }
            ArticleField::AuthorId => {
                set.push("author_id = ").push_bind_unseparated(a.author_id);
            }
        }
    }
    set.push("updated_at = ").push_bind_unseparated(now);

    builder.push(" WHERE id = ").push_bind(id);
    builder
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn squash(sql: &str) -> String {
        sql.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_list_query_filters() {
        let filter = ArticleFilter {
            page: 3,
            limit: 10,
            tab: Some(2),
            status: Some(ArticleStatus::Published),
        };
        let sql = squash(list_articles_query(&filter).sql());
        assert!(sql.ends_with(
            "WHERE TRUE AND (a.tab_id = $1 OR a.tab_id2 = $2 OR a.tab_id3 = $3) \
             AND a.status = $4 ORDER BY a.created_at DESC, a.id DESC LIMIT $5 OFFSET $6"
        ));
    }

    #[test]
    fn test_list_query_without_filters() {
        let sql = squash(list_articles_query(&ArticleFilter::default()).sql());
        assert!(sql.ends_with(
            "WHERE TRUE ORDER BY a.created_at DESC, a.id DESC LIMIT $1 OFFSET $2"
        ));
    }

    #[test]
    fn test_update_query_only_listed_fields() {
        let patch: ArticlePatch = serde_json::from_value(json!({
            "fields": ["status", "title"],
            "article": { "title": "New", "status": "published", "url": "ignored" }
        }))
        .unwrap();
        let now = Local.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert_eq!(
            update_article_query(5, &patch, now).sql(),
            "UPDATE articles SET title = $1, status = $2, updated_at = $3 WHERE id = $4"
        );
    }

    #[test]
    fn test_tab_list() {
        assert_eq!(tab_list(1, None, Some(3)), vec![1, 3]);
    }

    #[test]
    fn test_lock_order() {
        assert_eq!(lock_order(&[5, 2, 5, 9, 2]), vec![2, 5, 9]);
        assert!(lock_order(&[]).is_empty());
    }

    #[test]
    fn test_patched_tab_ids() {
        let patch: ArticlePatch = serde_json::from_value(json!({
            "fields": ["tab_id2", "title", "tab_id"],
            "article": { "tab_id": 4, "tab_id2": 6, "tab_id3": 8, "title": "x" }
        }))
        .unwrap();
        assert_eq!(patched_tab_ids(&patch), vec![4, 6]);

        let cleared: ArticlePatch = serde_json::from_value(json!({
            "fields": ["tab_id3"],
            "article": { "tab_id": 1 }
        }))
        .unwrap();
        assert!(patched_tab_ids(&cleared).is_empty());
    }
}
