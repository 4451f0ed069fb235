use std::sync::Arc;

use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use super::extract::{Json, Path, Query};
use crate::{
    clock::Clock,
    content::{Article, ArticleInput, ArticlePatch, link::tab_link},
    error::{Error, Result},
    remote::{Revalidator, revalidate_quietly},
    state::AppState,
    storage::{ArticleFilter, ArticleRepository, ArticleRow, Db},
};

/// 配置文章相关路由。
///
/// - `GET /articles?page&limit&tab&status`：文章列表
/// - `POST /articles`：新建文章
/// - `GET|PATCH|DELETE /articles/{id}`
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/articles", get(article_list).post(article_create))
        .route(
            "/articles/{id}",
            get(article_get).patch(article_update).delete(article_delete),
        )
}

/// 文章及其链接
///
/// `link` 是主栏目下的规范链接，`links` 依次对应每个关联栏目。
#[derive(Debug, Serialize)]
pub struct ArticleView {
    #[serde(flatten)]
    article: Article,
    link: String,
    links: Vec<String>,
}

impl From<ArticleRow> for ArticleView {
    fn from(row: ArticleRow) -> Self {
        let link = row.link();
        Self {
            link: link.canonical(),
            links: link.all(),
            article: row.article,
        }
    }
}

/// 文章变更后需要重新生成的页面：文章链接和所在栏目的链接
fn affected_paths(row: &ArticleRow) -> Vec<String> {
    let link = row.link();
    let mut paths = link.all();
    paths.extend(link.tabs.iter().map(|t| tab_link(t.layout, &t.url)));
    paths.sort();
    paths.dedup();
    paths
}

async fn article_list(
    Query(filter): Query<ArticleFilter>,
    State(pool): State<Db>,
) -> Result<Json<Vec<ArticleView>>> {
    let rows = pool.list_articles(&filter).await?;
    Ok(Json(rows.into_iter().map(ArticleView::from).collect()))
}

async fn article_get(Path(id): Path<i32>, State(pool): State<Db>) -> Result<Json<ArticleView>> {
    let row = pool
        .get_article(id)
        .await?
        .ok_or(Error::NotFound("article"))?;
    Ok(Json(row.into()))
}

async fn article_create(
    State(pool): State<Db>,
    State(clock): State<Arc<dyn Clock>>,
    State(revalidator): State<Revalidator>,
    Json(input): Json<ArticleInput>,
) -> Result<(StatusCode, Json<ArticleView>)> {
    input.validate()?;

    let row = pool.create_article(&input, clock.now()).await?;
    tracing::info!(article = row.article.id, "article created");

    revalidate_quietly(&revalidator, &pool, &affected_paths(&row)).await;
    Ok((StatusCode::CREATED, Json(row.into())))
}

async fn article_update(
    Path(id): Path<i32>,
    State(pool): State<Db>,
    State(clock): State<Arc<dyn Clock>>,
    State(revalidator): State<Revalidator>,
    Json(patch): Json<ArticlePatch>,
) -> Result<Json<ArticleView>> {
    let before = pool.get_article(id).await?;
    let row = pool.update_article(id, &patch, clock.now()).await?;

    let mut paths = affected_paths(&row);
    if let Some(before) = &before {
        paths.extend(affected_paths(before));
    }
    paths.sort();
    paths.dedup();
    revalidate_quietly(&revalidator, &pool, &paths).await;

    Ok(Json(row.into()))
}

async fn article_delete(
    Path(id): Path<i32>,
    State(pool): State<Db>,
    State(revalidator): State<Revalidator>,
) -> Result<StatusCode> {
    let row = pool
        .get_article(id)
        .await?
        .ok_or(Error::NotFound("article"))?;
    pool.delete_article(id).await?;
    tracing::info!(article = id, "article deleted");

    revalidate_quietly(&revalidator, &pool, &affected_paths(&row)).await;
    Ok(StatusCode::NO_CONTENT)
}
