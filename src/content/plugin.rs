//! 第三方集成插件
//!
//! 每个插件实现 [`Plugin`]：描述自己的配置项，并校验提交的 JSON 配置。
//! [`PluginRegistry::builtin`] 按插件 id 注册全部内置插件。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::error::{Error, Result};

/// 响应中替代密钥的占位符
pub const SECRET_MASK: &str = "******";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Secret,
    Number,
    Url,
    Bool,
}

/// 单个配置项的描述，前端据此渲染表单
#[derive(Debug, Clone, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSchema {
    const fn new(name: &'static str, label: &'static str, kind: FieldKind, required: bool) -> Self {
        Self {
            name,
            label,
            kind,
            required,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PluginSchema {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub fields: Vec<FieldSchema>,
}

/// 插件能力
pub trait Plugin: Send + Sync {
    fn id(&self) -> &'static str;

    fn describe(&self) -> PluginSchema;

    /// 校验配置，不合法时返回 [`Error::BadRequest`]
    fn validate(&self, config: &Value) -> Result<()>;
}

/// 按类型解析配置，把 serde 错误转换为请求错误
fn parse<T: DeserializeOwned>(plugin: &str, config: &Value) -> Result<T> {
    T::deserialize(config)
        .map_err(|e| Error::bad_request(format!("invalid {plugin} config: {e}")))
}

fn require(plugin: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::bad_request(format!(
            "{plugin}: `{field}` must not be empty"
        )));
    }
    Ok(())
}

fn require_http_url(plugin: &str, field: &str, value: &str) -> Result<()> {
    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(Error::bad_request(format!(
            "{plugin}: `{field}` must be an http(s) url"
        )));
    }
    Ok(())
}

/// Google Analytics
#[derive(Debug, Deserialize)]
pub struct AnalyticsConfig {
    pub measurement_id: String,
}

pub struct Analytics;

impl Plugin for Analytics {
    fn id(&self) -> &'static str {
        "analytics"
    }

    fn describe(&self) -> PluginSchema {
        PluginSchema {
            id: self.id(),
            name: "Google Analytics",
            description: "Site traffic statistics",
            fields: vec![FieldSchema::new(
                "measurement_id",
                "Measurement ID",
                FieldKind::Text,
                true,
            )],
        }
    }

    fn validate(&self, config: &Value) -> Result<()> {
        let config: AnalyticsConfig = parse(self.id(), config)?;
        if !config.measurement_id.starts_with("G-") {
            return Err(Error::bad_request(
                "analytics: `measurement_id` must start with `G-`",
            ));
        }
        Ok(())
    }
}

/// 微信公众号
#[derive(Debug, Deserialize)]
pub struct WechatConfig {
    pub app_id: String,
    pub app_secret: String,
    #[serde(default)]
    pub token: Option<String>,
}

pub struct Wechat;

impl Plugin for Wechat {
    fn id(&self) -> &'static str {
        "wechat"
    }

    fn describe(&self) -> PluginSchema {
        PluginSchema {
            id: self.id(),
            name: "WeChat",
            description: "WeChat official account integration",
            fields: vec![
                FieldSchema::new("app_id", "AppID", FieldKind::Text, true),
                FieldSchema::new("app_secret", "AppSecret", FieldKind::Secret, true),
                FieldSchema::new("token", "Token", FieldKind::Secret, false),
            ],
        }
    }

    fn validate(&self, config: &Value) -> Result<()> {
        let config: WechatConfig = parse(self.id(), config)?;
        require(self.id(), "app_id", &config.app_id)?;
        require(self.id(), "app_secret", &config.app_secret)
    }
}

/// 邮件发送
#[derive(Debug, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    #[serde(default = "default_tls")]
    pub tls: bool,
}

fn default_tls() -> bool {
    true
}

pub struct Smtp;

impl Plugin for Smtp {
    fn id(&self) -> &'static str {
        "smtp"
    }

    fn describe(&self) -> PluginSchema {
        PluginSchema {
            id: self.id(),
            name: "SMTP",
            description: "Outgoing mail server",
            fields: vec![
                FieldSchema::new("host", "Host", FieldKind::Text, true),
                FieldSchema::new("port", "Port", FieldKind::Number, true),
                FieldSchema::new("username", "Username", FieldKind::Text, true),
                FieldSchema::new("password", "Password", FieldKind::Secret, true),
                FieldSchema::new("from", "From address", FieldKind::Text, true),
                FieldSchema::new("tls", "Use TLS", FieldKind::Bool, false),
            ],
        }
    }

    fn validate(&self, config: &Value) -> Result<()> {
        let config: SmtpConfig = parse(self.id(), config)?;
        require(self.id(), "host", &config.host)?;
        require(self.id(), "username", &config.username)?;
        require(self.id(), "password", &config.password)?;
        if config.port == 0 {
            return Err(Error::bad_request("smtp: `port` must be between 1 and 65535"));
        }
        if !config.from.contains('@') {
            return Err(Error::bad_request("smtp: `from` must be an email address"));
        }
        Ok(())
    }
}

/// Google reCAPTCHA
#[derive(Debug, Deserialize)]
pub struct RecaptchaConfig {
    pub site_key: String,
    pub secret_key: String,
    #[serde(default)]
    pub min_score: Option<f64>,
}

pub struct Recaptcha;

impl Plugin for Recaptcha {
    fn id(&self) -> &'static str {
        "recaptcha"
    }

    fn describe(&self) -> PluginSchema {
        PluginSchema {
            id: self.id(),
            name: "reCAPTCHA",
            description: "Bot protection for public forms",
            fields: vec![
                FieldSchema::new("site_key", "Site key", FieldKind::Text, true),
                FieldSchema::new("secret_key", "Secret key", FieldKind::Secret, true),
                FieldSchema::new("min_score", "Minimum score", FieldKind::Number, false),
            ],
        }
    }

    fn validate(&self, config: &Value) -> Result<()> {
        let config: RecaptchaConfig = parse(self.id(), config)?;
        require(self.id(), "site_key", &config.site_key)?;
        require(self.id(), "secret_key", &config.secret_key)?;
        if let Some(score) = config.min_score {
            if !(0.0..=1.0).contains(&score) {
                return Err(Error::bad_request(
                    "recaptcha: `min_score` must be between 0 and 1",
                ));
            }
        }
        Ok(())
    }
}

/// Next.js 按需重新验证
#[derive(Debug, Clone, Deserialize)]
pub struct NextjsConfig {
    /// 前台站点地址，例如 `https://www.example.com`
    pub url: String,
    pub secret: String,
}

pub struct Nextjs;

impl Nextjs {
    pub const ID: &'static str = "nextjs";
}

impl Plugin for Nextjs {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn describe(&self) -> PluginSchema {
        PluginSchema {
            id: self.id(),
            name: "Next.js",
            description: "On-demand revalidation of the public site",
            fields: vec![
                FieldSchema::new("url", "Site URL", FieldKind::Url, true),
                FieldSchema::new("secret", "Revalidate secret", FieldKind::Secret, true),
            ],
        }
    }

    fn validate(&self, config: &Value) -> Result<()> {
        let config: NextjsConfig = parse(self.id(), config)?;
        require_http_url(self.id(), "url", &config.url)?;
        require(self.id(), "secret", &config.secret)
    }
}

impl NextjsConfig {
    pub fn from_value(config: &Value) -> Result<Self> {
        parse(Nextjs::ID, config)
    }
}

/// 按 id 查找插件
pub struct PluginRegistry {
    plugins: BTreeMap<&'static str, Box<dyn Plugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            plugins: BTreeMap::new(),
        }
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Analytics);
        registry.register(Wechat);
        registry.register(Smtp);
        registry.register(Recaptcha);
        registry.register(Nextjs);
        registry
    }

    pub fn register<P: Plugin + 'static>(&mut self, plugin: P) {
        self.plugins.insert(plugin.id(), Box::new(plugin));
    }

    pub fn get(&self, id: &str) -> Result<&dyn Plugin> {
        self.plugins
            .get(id)
            .map(|p| p.as_ref())
            .ok_or(Error::NotFound("plugin"))
    }

    /// 全部插件描述，按 id 排序
    pub fn schemas(&self) -> Vec<PluginSchema> {
        self.plugins.values().map(|p| p.describe()).collect()
    }

    /// 把配置中的密钥字段替换为 [`SECRET_MASK`]
    pub fn mask(&self, id: &str, config: &Value) -> Result<Value> {
        let plugin = self.get(id)?;
        let mut masked = config.clone();
        if let Some(object) = masked.as_object_mut() {
            for field in secret_fields(plugin) {
                if let Some(value) = object.get_mut(field) {
                    if value.as_str().is_some_and(|s| !s.is_empty()) {
                        *value = Value::String(SECRET_MASK.to_string());
                    }
                }
            }
        }
        Ok(masked)
    }

    /// 提交的密钥仍是占位符时，保留已保存的值
    pub fn restore_secrets(
        &self,
        id: &str,
        submitted: &mut Value,
        stored: Option<&Value>,
    ) -> Result<()> {
        let plugin = self.get(id)?;
        let Some(object) = submitted.as_object_mut() else {
            return Ok(());
        };
        for field in secret_fields(plugin) {
            if object.get(field).and_then(Value::as_str) != Some(SECRET_MASK) {
                continue;
            }
            match stored.and_then(|s| s.get(field)) {
                Some(previous) => {
                    object.insert(field.to_string(), previous.clone());
                }
                None => {
                    object.remove(field);
                }
            }
        }
        Ok(())
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn secret_fields(plugin: &dyn Plugin) -> Vec<&'static str> {
    plugin
        .describe()
        .fields
        .into_iter()
        .filter(|f| f.kind == FieldKind::Secret)
        .map(|f| f.name)
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_builtin_registry() {
        let registry = PluginRegistry::builtin();
        let ids: Vec<_> = registry.schemas().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["analytics", "nextjs", "recaptcha", "smtp", "wechat"]);
        assert!(matches!(registry.get("paypal"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_validation() {
        let registry = PluginRegistry::builtin();

        let ok = |id, config| registry.get(id).unwrap().validate(&config).is_ok();

        assert!(ok("analytics", json!({ "measurement_id": "G-ABC123" })));
        assert!(!ok("analytics", json!({ "measurement_id": "UA-1" })));
        assert!(!ok("analytics", json!({})));

        assert!(ok("wechat", json!({ "app_id": "wx1", "app_secret": "s" })));
        assert!(!ok("wechat", json!({ "app_id": "wx1", "app_secret": " " })));

        let smtp = json!({
            "host": "smtp.example.com", "port": 465, "username": "u",
            "password": "p", "from": "noreply@example.com"
        });
        assert!(ok("smtp", smtp.clone()));
        let mut bad = smtp.clone();
        bad["port"] = json!(0);
        assert!(!ok("smtp", bad));
        let mut bad = smtp.clone();
        bad["port"] = json!(70000);
        assert!(!ok("smtp", bad));
        let mut bad = smtp.clone();
        bad["username"] = json!("");
        assert!(!ok("smtp", bad));
        let mut bad = smtp;
        bad["password"] = json!("  ");
        assert!(!ok("smtp", bad));

        assert!(ok("recaptcha", json!({ "site_key": "a", "secret_key": "b", "min_score": 0.5 })));
        assert!(!ok("recaptcha", json!({ "site_key": "a", "secret_key": "b", "min_score": 2.0 })));

        assert!(ok("nextjs", json!({ "url": "https://www.example.com", "secret": "x" })));
        assert!(!ok("nextjs", json!({ "url": "ftp://example.com", "secret": "x" })));
    }

    #[test]
    fn test_mask_and_restore() {
        let registry = PluginRegistry::builtin();
        let stored = json!({ "app_id": "wx1", "app_secret": "real-secret", "token": "tok" });

        let masked = registry.mask("wechat", &stored).unwrap();
        assert_eq!(masked["app_id"], "wx1");
        assert_eq!(masked["app_secret"], SECRET_MASK);
        assert_eq!(masked["token"], SECRET_MASK);

        let mut submitted = json!({ "app_id": "wx2", "app_secret": SECRET_MASK, "token": "new" });
        registry
            .restore_secrets("wechat", &mut submitted, Some(&stored))
            .unwrap();
        assert_eq!(submitted["app_id"], "wx2");
        assert_eq!(submitted["app_secret"], "real-secret");
        assert_eq!(submitted["token"], "new");

        let mut first_time = json!({ "app_id": "wx", "app_secret": SECRET_MASK });
        registry
            .restore_secrets("wechat", &mut first_time, None)
            .unwrap();
        assert!(first_time.get("app_secret").is_none());
    }

    #[test]
    fn test_nextjs_config_from_value() {
        let config =
            NextjsConfig::from_value(&json!({ "url": "https://a.com", "secret": "s" })).unwrap();
        assert_eq!(config.url, "https://a.com");
        assert!(NextjsConfig::from_value(&json!({ "url": 1 })).is_err());
    }
}
