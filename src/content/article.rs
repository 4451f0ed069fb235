use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Local};
use serde::{Deserialize, Serialize};

use super::{
    link::{DISABLED_LINK, article_link},
    tab::TabLayout,
};
use crate::error::{Error, Result};

/// 文章状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type, Serialize, Deserialize)]
#[repr(i16)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    #[default]
    Draft = 0,
    Published = 1,
    Hidden = 2,
}

/// 文章
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Article {
    pub id: i32,
    /// 主栏目，决定规范链接
    pub tab_id: i32,
    pub tab_id2: Option<i32>,
    pub tab_id3: Option<i32>,
    pub title: String,
    /// 文章自身的 URL 片段
    pub url: String,
    pub summary: String,
    pub content: String,
    pub cover: Option<String>,
    pub status: ArticleStatus,
    pub author_id: Option<i32>,
    pub views: i32,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl Article {
    /// 关联的栏目 id，主栏目在前
    pub fn tab_ids(&self) -> Vec<i32> {
        [Some(self.tab_id), self.tab_id2, self.tab_id3]
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn year(&self) -> i32 {
        self.created_at.year()
    }
}

/// 关联栏目的链接信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkedTab {
    pub id: i32,
    pub layout: TabLayout,
    pub url: String,
}

/// 文章链接投影
///
/// 由文章 URL、年份和最多三个关联栏目（主栏目在前）组成，查询时计算，不落库。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleLink {
    pub url: String,
    pub year: i32,
    pub tabs: Vec<LinkedTab>,
}

impl ArticleLink {
    /// 规范链接，由主栏目决定；没有主栏目时不可链接
    pub fn canonical(&self) -> String {
        self.tabs
            .first()
            .map(|tab| self.link_under(tab))
            .unwrap_or_else(|| DISABLED_LINK.to_string())
    }

    /// 每个关联栏目下的链接
    pub fn all(&self) -> Vec<String> {
        self.tabs.iter().map(|tab| self.link_under(tab)).collect()
    }

    fn link_under(&self, tab: &LinkedTab) -> String {
        article_link(tab.layout, &tab.url, &self.url, self.year)
    }
}

/// 创建或更新文章时提交的字段
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArticleInput {
    pub tab_id: i32,
    pub tab_id2: Option<i32>,
    pub tab_id3: Option<i32>,
    pub title: String,
    pub url: String,
    pub summary: String,
    pub content: String,
    pub cover: Option<String>,
    pub status: ArticleStatus,
    pub author_id: Option<i32>,
}

impl ArticleInput {
    pub fn validate(&self) -> Result<()> {
        validate_title(&self.title)?;
        validate_url(&self.url)?;
        validate_tabs(self.tab_id, self.tab_id2, self.tab_id3)
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::bad_request("article title must not be empty"));
    }
    Ok(())
}

/// 文章 URL 是单个路径段
fn validate_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(Error::bad_request("article url must not be empty"));
    }
    if url.contains('/') || url.chars().any(char::is_whitespace) {
        return Err(Error::bad_request(
            "article url must be a single path segment without whitespace",
        ));
    }
    Ok(())
}

fn validate_tabs(primary: i32, second: Option<i32>, third: Option<i32>) -> Result<()> {
    let ids: Vec<i32> = [Some(primary), second, third].into_iter().flatten().collect();
    let unique: BTreeSet<i32> = ids.iter().copied().collect();
    if unique.len() != ids.len() {
        return Err(Error::bad_request("an article cannot list the same tab twice"));
    }
    Ok(())
}

/// 可部分更新的文章字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArticleField {
    TabId,
    TabId2,
    TabId3,
    Title,
    Url,
    Summary,
    Content,
    Cover,
    Status,
    AuthorId,
}

/// 部分更新，只写入 `fields` 中列出的字段
#[derive(Debug, Clone, Deserialize)]
pub struct ArticlePatch {
    pub fields: Vec<ArticleField>,
    #[serde(default)]
    pub article: ArticleInput,
}

impl ArticlePatch {
    pub fn changed(&self) -> BTreeSet<ArticleField> {
        self.fields.iter().copied().collect()
    }

    /// 校验更新后的文章
    ///
    /// 栏目重复需要结合现有文章判断，所以传入当前值。
    pub fn validate(&self, current: &Article) -> Result<()> {
        let changed = self.changed();
        if changed.is_empty() {
            return Err(Error::bad_request("no fields to update"));
        }
        if changed.contains(&ArticleField::Title) {
            validate_title(&self.article.title)?;
        }
        if changed.contains(&ArticleField::Url) {
            validate_url(&self.article.url)?;
        }

        let pick = |field: ArticleField, new: Option<i32>, old: Option<i32>| {
            if changed.contains(&field) { new } else { old }
        };
        let primary = if changed.contains(&ArticleField::TabId) {
            self.article.tab_id
        } else {
            current.tab_id
        };
        validate_tabs(
            primary,
            pick(ArticleField::TabId2, self.article.tab_id2, current.tab_id2),
            pick(ArticleField::TabId3, self.article.tab_id3, current.tab_id3),
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn article() -> Article {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        Article {
            id: 1,
            tab_id: 2,
            tab_id2: Some(5),
            tab_id3: None,
            title: "Launch".into(),
            url: "launch".into(),
            summary: String::new(),
            content: String::new(),
            cover: None,
            status: ArticleStatus::Published,
            author_id: None,
            views: 0,
            created_at: at,
            updated_at: at,
        }
    }

    fn linked(id: i32, layout: TabLayout, url: &str) -> LinkedTab {
        LinkedTab {
            id,
            layout,
            url: url.into(),
        }
    }

    #[test]
    fn test_article_year_and_tabs() {
        let a = article();
        assert_eq!(a.year(), 2024);
        assert_eq!(a.tab_ids(), vec![2, 5]);
    }

    #[test]
    fn test_canonical_link() {
        let link = ArticleLink {
            url: "launch".into(),
            year: 2024,
            tabs: vec![
                linked(2, TabLayout::TitleList, "/news"),
                linked(5, TabLayout::None, "/hidden"),
                linked(6, TabLayout::Article, "/about"),
            ],
        };
        assert_eq!(link.canonical(), "/news/2024/launch");
        assert_eq!(link.all(), vec!["/news/2024/launch", "#", "/about"]);

        let orphan = ArticleLink {
            url: "launch".into(),
            year: 2024,
            tabs: vec![],
        };
        assert_eq!(orphan.canonical(), DISABLED_LINK);
    }

    #[test]
    fn test_status_serde() {
        assert_eq!(
            serde_json::to_value(ArticleStatus::Published).unwrap(),
            json!("published")
        );
        let status: ArticleStatus = serde_json::from_value(json!("hidden")).unwrap();
        assert_eq!(status, ArticleStatus::Hidden);
    }

    #[test]
    fn test_input_validation() {
        let input: ArticleInput = serde_json::from_value(json!({
            "tab_id": 2, "title": "Launch", "url": "launch"
        }))
        .unwrap();
        assert!(input.validate().is_ok());
        assert_eq!(input.status, ArticleStatus::Draft);

        let mut bad = input.clone();
        bad.url = "a/b".into();
        assert!(bad.validate().is_err());

        let mut bad = input.clone();
        bad.tab_id2 = Some(2);
        assert!(bad.validate().is_err());

        let mut bad = input;
        bad.title = " ".into();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_patch_checks_tabs_against_current() {
        let current = article();

        // 把第三栏目设为当前主栏目
        let patch: ArticlePatch = serde_json::from_value(json!({
            "fields": ["tab_id3"],
            "article": { "tab_id3": 2 }
        }))
        .unwrap();
        assert!(patch.validate(&current).is_err());

        // 同时改主栏目则不冲突
        let patch: ArticlePatch = serde_json::from_value(json!({
            "fields": ["tab_id", "tab_id3"],
            "article": { "tab_id": 9, "tab_id3": 2 }
        }))
        .unwrap();
        assert!(patch.validate(&current).is_ok());

        let patch: ArticlePatch = serde_json::from_value(json!({ "fields": [] })).unwrap();
        assert!(patch.validate(&current).is_err());
    }
}
