use serde::{Deserialize, Serialize};

use crate::{
    config::TranslateConfig,
    content::Translator,
    error::{Error, Result},
};

/// HttpTranslator 调用 LibreTranslate 兼容的翻译接口
///
/// 把栏目名称翻译为英文，供 URL 自动生成使用。未配置地址时所有请求都返回错误，
/// 调用方据此放弃建议。
#[derive(Clone)]
pub struct HttpTranslator {
    client: reqwest::Client,
    url: Option<String>,
    api_key: Option<String>,
}

impl HttpTranslator {
    /// 使用配置创建翻译器，请求超时取 `config.timeout_ms`
    pub fn new(config: &TranslateConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(super::USER_AGENT)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone().filter(|u| !u.trim().is_empty()),
            api_key: config.api_key.clone(),
        })
    }
}

#[derive(Serialize)]
struct RequestBody<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseBody {
    translated_text: String,
}

impl Translator for HttpTranslator {
    async fn translate(&self, text: &str) -> Result<String> {
        let url = self
            .url
            .as_deref()
            .ok_or_else(|| Error::Upstream("translation service is not configured".into()))?;

        let resp = self
            .client
            .post(url)
            .json(&RequestBody {
                q: text,
                source: "auto",
                target: "en",
                api_key: self.api_key.as_deref(),
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Upstream(format!(
                "translation service returned {status}"
            )));
        }
        Ok(resp.json::<ResponseBody>().await?.translated_text)
    }
}
