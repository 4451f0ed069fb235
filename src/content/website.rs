use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 站点设置，全站只有一条
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(default)]
pub struct Website {
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub keywords: Vec<String>,
    pub logo: Option<String>,
    pub favicon: Option<String>,
    pub copyright: String,
    /// 模板自定义的设置项
    pub meta: serde_json::Value,
    #[serde(skip_deserializing)]
    pub updated_at: Option<DateTime<Local>>,
}

impl Default for Website {
    fn default() -> Self {
        Self {
            title: String::new(),
            subtitle: String::new(),
            description: String::new(),
            keywords: Vec::new(),
            logo: None,
            favicon: None,
            copyright: String::new(),
            meta: serde_json::Value::Object(Default::default()),
            updated_at: None,
        }
    }
}

impl Website {
    /// 去掉关键词首尾空白和空项
    pub fn normalized(mut self) -> Result<Self> {
        if !self.meta.is_object() {
            return Err(Error::bad_request("website meta must be a JSON object"));
        }
        self.keywords = self
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let site: Website = serde_json::from_value(json!({
            "title": "Acme",
            "keywords": [" rust ", "", "cms"],
            "updated_at": "ignored"
        }))
        .unwrap();
        let site = site.normalized().unwrap();
        assert_eq!(site.title, "Acme");
        assert_eq!(site.keywords, vec!["rust", "cms"]);
        assert!(site.meta.is_object());
        assert!(site.updated_at.is_none());
    }

    #[test]
    fn test_meta_must_be_object() {
        let site = Website {
            meta: json!([1, 2]),
            ..Default::default()
        };
        assert!(site.normalized().is_err());
    }
}
