use std::{collections::BTreeMap, sync::Arc};

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use serde::{Deserialize, Serialize};

use super::extract::{Json, Path, Query};
use crate::{
    clock::Clock,
    content::{
        Ancestor, Ancestry, Tab, TabInput, TabPatch,
        ancestry::ancestors_of,
        link::{nearest_prefix, tab_link},
        slug::suggest_url,
    },
    error::{Error, Result},
    remote::HttpTranslator,
    state::AppState,
    storage::{Db, TabRepository},
};

/// 配置栏目相关路由。
///
/// - `GET /tabs`：全部栏目
/// - `POST /tabs`：新建栏目
/// - `PUT /tabs/sort`：批量排序
/// - `GET /tabs/suggest-url`：根据名称建议 URL
/// - `GET|PATCH|DELETE /tabs/{id}`
/// - `GET /tabs/{id}/children`：子栏目及其祖先
/// - `GET /tab/ancestors/{id}`：祖先链
pub fn setup_route() -> Router<AppState> {
    Router::new()
        .route("/tabs", get(tab_list).post(tab_create))
        .route("/tabs/sort", put(tab_sort))
        .route("/tabs/suggest-url", get(tab_suggest_url))
        .route(
            "/tabs/{id}",
            get(tab_get).patch(tab_update).delete(tab_delete),
        )
        .route("/tabs/{id}/children", get(tab_children))
        .route("/tab/ancestors/{id}", get(tab_ancestors))
}

/// 栏目及其对外链接
#[derive(Debug, Serialize)]
pub struct TabView {
    #[serde(flatten)]
    tab: Tab,
    link: String,
}

impl From<Tab> for TabView {
    fn from(tab: Tab) -> Self {
        let link = tab_link(tab.layout, &tab.url);
        Self { tab, link }
    }
}

#[derive(Debug, Serialize)]
struct ChildrenView {
    tabs: Vec<TabView>,
    /// 全部子栏目的祖先，合并去重
    ancestors: Vec<Ancestor>,
}

async fn tab_list(State(pool): State<Db>) -> Result<Json<Vec<TabView>>> {
    let tabs = pool.list_tabs().await?;
    Ok(Json(tabs.into_iter().map(TabView::from).collect()))
}

async fn tab_get(Path(id): Path<i32>, State(pool): State<Db>) -> Result<Json<TabView>> {
    let tab = pool.get_tab(id).await?.ok_or(Error::NotFound("tab"))?;
    Ok(Json(tab.into()))
}

async fn tab_children(Path(id): Path<i32>, State(pool): State<Db>) -> Result<Json<ChildrenView>> {
    let tabs = pool.child_tabs(id).await?;
    let ids: Vec<i32> = tabs.iter().map(|t| t.id).collect();
    let ancestry = Ancestry::resolve(&pool, &ids).await?;

    Ok(Json(ChildrenView {
        tabs: tabs.into_iter().map(TabView::from).collect(),
        ancestors: ancestry.merged(),
    }))
}

/// 最近的祖先在前，根栏目和不存在的栏目返回空数组
async fn tab_ancestors(Path(id): Path<i32>, State(pool): State<Db>) -> Result<Json<Vec<Ancestor>>> {
    Ok(Json(ancestors_of(&pool, id).await?))
}

#[derive(Debug, Deserialize)]
struct SuggestParams {
    name: String,
    parent: Option<i32>,
}

#[derive(Debug, Serialize)]
struct SuggestedUrl {
    url: Option<String>,
}

/// 根据名称建议 URL，翻译服务不可用时 `url` 为 `null`
async fn tab_suggest_url(
    Query(params): Query<SuggestParams>,
    State(pool): State<Db>,
    State(translator): State<HttpTranslator>,
) -> Result<Json<SuggestedUrl>> {
    let lineage = match params.parent {
        Some(parent) => {
            let lineage = Ancestry::resolve(&pool, &[parent]).await?.lineage(parent)?;
            if lineage.is_empty() {
                return Err(Error::NotFound("tab"));
            }
            Some(lineage)
        }
        None => None,
    };
    let prefix = lineage.as_deref().map(nearest_prefix);

    let url = suggest_url(&params.name, prefix, &translator).await;
    Ok(Json(SuggestedUrl { url }))
}

async fn tab_create(
    State(pool): State<Db>,
    State(clock): State<Arc<dyn Clock>>,
    Json(input): Json<TabInput>,
) -> Result<(StatusCode, Json<TabView>)> {
    input.validate()?;
    if let Some(parent) = input.parent {
        if pool.get_tab(parent).await?.is_none() {
            return Err(Error::bad_request(format!(
                "parent tab {parent} does not exist"
            )));
        }
    }

    let tab = pool.create_tab(&input, clock.now()).await?;
    tracing::info!(tab = tab.id, name = %tab.name, "tab created");
    Ok((StatusCode::CREATED, Json(tab.into())))
}

async fn tab_update(
    Path(id): Path<i32>,
    State(pool): State<Db>,
    State(clock): State<Arc<dyn Clock>>,
    Json(patch): Json<TabPatch>,
) -> Result<Json<TabView>> {
    patch.validate()?;

    let tab = pool
        .update_tab(id, &patch, clock.now())
        .await?
        .ok_or(Error::NotFound("tab"))?;
    Ok(Json(tab.into()))
}

async fn tab_delete(Path(id): Path<i32>, State(pool): State<Db>) -> Result<StatusCode> {
    pool.delete_tab(id).await?;
    tracing::info!(tab = id, "tab deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
struct Affected {
    affected: u64,
}

/// 批量排序，请求体为 `{"<id>": <sort>}`
async fn tab_sort(
    State(pool): State<Db>,
    State(clock): State<Arc<dyn Clock>>,
    Json(order): Json<BTreeMap<i32, i32>>,
) -> Result<Json<Affected>> {
    let affected = pool.sort_tabs(&order, clock.now()).await?;
    Ok(Json(Affected { affected }))
}
