use std::{collections::HashMap, sync::Arc};

use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::extract::{Json, Path};
use crate::{
    clock::Clock,
    content::{PluginRegistry, PluginSchema},
    error::Result,
    state::AppState,
    storage::{Db, PluginRecord, PluginRepository},
};

/// 配置插件相关路由。
///
/// - `GET /plugins`：全部插件的描述和状态
/// - `GET|PUT|DELETE /plugins/{id}`
pub fn setup_route() -> Router<AppState> {
    Router::new().route("/plugins", get(plugin_list)).route(
        "/plugins/{id}",
        get(plugin_get).put(plugin_put).delete(plugin_delete),
    )
}

#[derive(Debug, Serialize)]
struct PluginSummary {
    #[serde(flatten)]
    schema: PluginSchema,
    configured: bool,
    enabled: bool,
}

/// 插件配置，密钥字段已遮蔽
#[derive(Debug, Serialize)]
struct PluginView {
    id: String,
    enabled: bool,
    config: Value,
    updated_at: Option<DateTime<Local>>,
}

impl PluginView {
    fn masked(registry: &PluginRegistry, id: &str, record: Option<PluginRecord>) -> Result<Self> {
        Ok(match record {
            Some(record) => Self {
                config: registry.mask(id, &record.config)?,
                id: record.id,
                enabled: record.enabled,
                updated_at: Some(record.updated_at),
            },
            None => Self {
                id: id.to_string(),
                enabled: false,
                config: Value::Object(Default::default()),
                updated_at: None,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct PluginInput {
    #[serde(default)]
    enabled: bool,
    config: Value,
}

async fn plugin_list(
    State(pool): State<Db>,
    State(registry): State<Arc<PluginRegistry>>,
) -> Result<Json<Vec<PluginSummary>>> {
    let stored: HashMap<String, bool> = pool
        .list_plugins()
        .await?
        .into_iter()
        .map(|r| (r.id, r.enabled))
        .collect();

    let plugins = registry
        .schemas()
        .into_iter()
        .map(|schema| {
            let enabled = stored.get(schema.id).copied();
            PluginSummary {
                configured: enabled.is_some(),
                enabled: enabled.unwrap_or(false),
                schema,
            }
        })
        .collect();
    Ok(Json(plugins))
}

async fn plugin_get(
    Path(id): Path<String>,
    State(pool): State<Db>,
    State(registry): State<Arc<PluginRegistry>>,
) -> Result<Json<PluginView>> {
    registry.get(&id)?;
    let record = pool.get_plugin(&id).await?;
    Ok(Json(PluginView::masked(&registry, &id, record)?))
}

/// 保存配置，仍为占位符的密钥保留原值
async fn plugin_put(
    Path(id): Path<String>,
    State(pool): State<Db>,
    State(registry): State<Arc<PluginRegistry>>,
    State(clock): State<Arc<dyn Clock>>,
    Json(input): Json<PluginInput>,
) -> Result<Json<PluginView>> {
    let plugin = registry.get(&id)?;
    let stored = pool.get_plugin(&id).await?;

    let mut config = input.config;
    registry.restore_secrets(&id, &mut config, stored.as_ref().map(|r| &r.config))?;
    plugin.validate(&config)?;

    let record = pool
        .save_plugin(&id, input.enabled, &config, clock.now())
        .await?;
    tracing::info!(plugin = %id, enabled = record.enabled, "plugin config saved");
    Ok(Json(PluginView::masked(&registry, &id, Some(record))?))
}

async fn plugin_delete(
    Path(id): Path<String>,
    State(pool): State<Db>,
    State(registry): State<Arc<PluginRegistry>>,
) -> Result<StatusCode> {
    registry.get(&id)?;
    pool.delete_plugin(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
