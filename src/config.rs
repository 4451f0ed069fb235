use std::{env, path::Path, time::Duration};

use serde::Deserialize;

use crate::error::{Error, Result};

/// 服务配置
///
/// 先从 `SITECMS_CONFIG` 指向的 TOML 文件加载（可选），再由环境变量覆盖。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Postgres 连接串，环境变量 `DATABASE_URL`
    pub database_url: Option<String>,
    /// 监听地址，环境变量 `SITECMS_BIND`
    pub bind: String,
    pub translate: TranslateConfig,
    pub revalidate: RevalidateConfig,
}

/// 翻译服务配置，用于栏目 URL 自动生成
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

/// Next.js 按需重新验证的请求配置
///
/// 目标站点地址和密钥由 `nextjs` 插件保存在数据库中。
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RevalidateConfig {
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            bind: "0.0.0.0:3000".to_string(),
            translate: TranslateConfig::default(),
            revalidate: RevalidateConfig::default(),
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            timeout_ms: 3000,
        }
    }
}

impl Default for RevalidateConfig {
    fn default() -> Self {
        Self { timeout_ms: 5000 }
    }
}

impl TranslateConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl RevalidateConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Config {
    /// 加载配置文件并应用环境变量
    pub fn load() -> Result<Self> {
        let base = match env::var("SITECMS_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env(|key| env::var(key).ok()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// 用 `var` 提供的变量覆盖配置项
    pub fn with_env<F>(mut self, var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = var("DATABASE_URL") {
            self.database_url = Some(url);
        }
        if let Some(bind) = var("SITECMS_BIND") {
            self.bind = bind;
        }
        if let Some(url) = var("SITECMS_TRANSLATE_URL") {
            self.translate.url = Some(url);
        }
        if let Some(key) = var("SITECMS_TRANSLATE_KEY") {
            self.translate.api_key = Some(key);
        }
        if let Some(ms) = parse_millis(&var, "SITECMS_TRANSLATE_TIMEOUT_MS") {
            self.translate.timeout_ms = ms;
        }
        if let Some(ms) = parse_millis(&var, "SITECMS_REVALIDATE_TIMEOUT_MS") {
            self.revalidate.timeout_ms = ms;
        }
        self
    }

    pub fn database_url(&self) -> Result<&str> {
        self.database_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .ok_or(Error::MissingConfig("DATABASE_URL"))
    }
}

fn parse_millis<F>(var: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = var(key)?;
    match raw.trim().parse() {
        Ok(ms) => Some(ms),
        Err(_) => {
            tracing::warn!(key, value = %raw, "ignoring invalid millisecond value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, io::Write};

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default().with_env(vars(&[]));
        assert_eq!(config.bind, "0.0.0.0:3000");
        assert_eq!(config.translate.timeout_ms, 3000);
        assert_eq!(config.revalidate.timeout(), Duration::from_secs(5));
        assert!(matches!(
            config.database_url(),
            Err(Error::MissingConfig("DATABASE_URL"))
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().expect("创建临时文件失败");
        writeln!(
            file,
            r#"
            database_url = "postgres://file/db"
            bind = "127.0.0.1:8080"

            [translate]
            url = "http://translate.local/translate"
            timeout_ms = 1000
            "#
        )
        .expect("写入失败");

        let config = Config::from_file(file.path())
            .expect("解析配置失败")
            .with_env(vars(&[
                ("DATABASE_URL", "postgres://env/db"),
                ("SITECMS_TRANSLATE_TIMEOUT_MS", "250"),
                ("SITECMS_REVALIDATE_TIMEOUT_MS", "not-a-number"),
            ]));

        assert_eq!(config.database_url().unwrap(), "postgres://env/db");
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(
            config.translate.url.as_deref(),
            Some("http://translate.local/translate")
        );
        assert_eq!(config.translate.timeout_ms, 250);
        assert_eq!(config.revalidate.timeout_ms, 5000);
    }

    #[test]
    fn test_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().expect("创建临时文件失败");
        writeln!(file, "bind = [").expect("写入失败");
        assert!(matches!(
            Config::from_file(file.path()),
            Err(Error::Config(_))
        ));
    }
}
