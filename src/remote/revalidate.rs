use serde::Serialize;

use crate::{
    config::RevalidateConfig,
    content::{
        link::DISABLED_LINK,
        plugin::{Nextjs, NextjsConfig},
    },
    error::{Error, Result},
    storage::PluginRepository,
};

/// 请求 Next.js 前台按需重新生成页面
#[derive(Clone)]
pub struct Revalidator {
    client: reqwest::Client,
}

#[derive(Serialize)]
struct RequestBody<'a> {
    path: &'a str,
}

impl Revalidator {
    pub fn new(config: &RevalidateConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(super::USER_AGENT)
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client })
    }

    /// 向 `{site}/api/revalidate` 提交一个路径，`#` 会被跳过
    pub async fn revalidate(&self, site: &NextjsConfig, path: &str) -> Result<()> {
        if path.is_empty() || path == DISABLED_LINK {
            return Ok(());
        }

        let endpoint = format!("{}/api/revalidate", site.url.trim_end_matches('/'));
        let resp = self
            .client
            .post(endpoint)
            .header("x-revalidate-secret", &site.secret)
            .json(&RequestBody { path })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "revalidate {path} failed: {status} {}",
                text.trim()
            )));
        }
        tracing::debug!(path, "revalidated");
        Ok(())
    }

    /// 读取已启用的 `nextjs` 插件配置，未配置或未启用时返回 `None`
    pub async fn site<P: PluginRepository>(&self, plugins: &P) -> Result<Option<NextjsConfig>> {
        match plugins.get_plugin(Nextjs::ID).await? {
            Some(record) if record.enabled => Ok(Some(NextjsConfig::from_value(&record.config)?)),
            _ => Ok(None),
        }
    }
}

/// 写操作提交后的重新验证，失败只记录日志
pub async fn revalidate_quietly<P: PluginRepository>(
    revalidator: &Revalidator,
    plugins: &P,
    paths: &[String],
) {
    let site = match revalidator.site(plugins).await {
        Ok(Some(site)) => site,
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(%e, "failed to load nextjs plugin config");
            return;
        }
    };

    for path in paths {
        if let Err(e) = revalidator.revalidate(&site, path).await {
            tracing::warn!(%e, path, "revalidation failed");
        }
    }
}
