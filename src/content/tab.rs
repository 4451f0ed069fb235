use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::ancestry::Ancestor;
use crate::error::{Error, Result};

/// 栏目布局
///
/// 决定栏目本身以及栏目下文章的链接形式，见 [`super::link`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type, Serialize, Deserialize)]
#[repr(i16)]
#[serde(try_from = "i16", into = "i16")]
pub enum TabLayout {
    /// 单篇文章，栏目即文章页
    Article = 0,
    /// 不可链接
    None = 1,
    TitleList = 2,
    TitleDescriptionList = 3,
    LogoList = 4,
    FullList = 5,
    ContentList = 6,
    Template = 7,
}

impl TabLayout {
    pub fn is_linkable(self) -> bool {
        self != TabLayout::None
    }
}

impl Default for TabLayout {
    fn default() -> Self {
        TabLayout::TitleList
    }
}

#[derive(Debug)]
pub struct UnknownLayout(i16);

impl fmt::Display for UnknownLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tab layout code {}", self.0)
    }
}

impl TryFrom<i16> for TabLayout {
    type Error = UnknownLayout;

    fn try_from(code: i16) -> std::result::Result<Self, Self::Error> {
        Ok(match code {
            0 => TabLayout::Article,
            1 => TabLayout::None,
            2 => TabLayout::TitleList,
            3 => TabLayout::TitleDescriptionList,
            4 => TabLayout::LogoList,
            5 => TabLayout::FullList,
            6 => TabLayout::ContentList,
            7 => TabLayout::Template,
            other => return Err(UnknownLayout(other)),
        })
    }
}

impl From<TabLayout> for i16 {
    fn from(layout: TabLayout) -> Self {
        layout as i16
    }
}

/// 栏目
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Tab {
    pub id: i32,
    pub parent: Option<i32>,
    pub name: String,
    pub url: String,
    pub layout: TabLayout,
    pub enabled: bool,
    /// 冗余的文章数，随文章写入一起更新
    pub article_count: i32,
    pub sort: i32,
    pub logo: Option<String>,
    pub icon: Option<String>,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl Tab {
    /// 站点根栏目：没有父栏目，URL 为 `/` 或空
    ///
    /// 子栏目的 URL 为空只表示没有独立路径，不是根栏目。
    pub fn is_site_root(&self) -> bool {
        self.parent.is_none() && self.url.trim_matches('/').is_empty()
    }

    /// 检查栏目能否被删除
    ///
    /// 根栏目、仍有文章或仍有子栏目的栏目都不能删除。`articles` 是删除事务内
    /// 实时统计的文章数，不读冗余的 `article_count`。
    pub fn check_deletable(&self, articles: i64, has_children: bool) -> Result<()> {
        if self.is_site_root() {
            return Err(Error::Conflict("the site root tab cannot be deleted".into()));
        }
        if articles > 0 {
            return Err(Error::Conflict(format!(
                "tab {} still has {} articles",
                self.id, articles
            )));
        }
        if has_children {
            return Err(Error::Conflict(format!(
                "tab {} still has child tabs",
                self.id
            )));
        }
        Ok(())
    }
}

/// 创建或更新栏目时提交的字段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TabInput {
    pub parent: Option<i32>,
    pub name: String,
    pub url: String,
    pub layout: TabLayout,
    pub enabled: bool,
    pub sort: i32,
    pub logo: Option<String>,
    pub icon: Option<String>,
    pub meta: serde_json::Value,
}

impl Default for TabInput {
    fn default() -> Self {
        Self {
            parent: None,
            name: String::new(),
            url: String::new(),
            layout: TabLayout::default(),
            enabled: true,
            sort: 0,
            logo: None,
            icon: None,
            meta: serde_json::Value::Object(Default::default()),
        }
    }
}

impl TabInput {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::bad_request("tab name must not be empty"));
        }
        validate_url(&self.url)?;
        if !self.meta.is_object() && !self.meta.is_null() {
            return Err(Error::bad_request("tab meta must be a JSON object"));
        }
        Ok(())
    }
}

fn validate_url(url: &str) -> Result<()> {
    if url.chars().any(char::is_whitespace) {
        return Err(Error::bad_request("tab url must not contain whitespace"));
    }
    Ok(())
}

/// 可部分更新的栏目字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TabField {
    Parent,
    Name,
    Url,
    Layout,
    Enabled,
    Sort,
    Logo,
    Icon,
    Meta,
}

/// 部分更新
///
/// 只有 `fields` 中列出的字段会被写入，`tab` 中其余字段忽略。
#[derive(Debug, Clone, Deserialize)]
pub struct TabPatch {
    pub fields: Vec<TabField>,
    #[serde(default)]
    pub tab: TabInput,
}

impl TabPatch {
    /// 去重后的字段集合
    pub fn changed(&self) -> BTreeSet<TabField> {
        self.fields.iter().copied().collect()
    }

    pub fn validate(&self) -> Result<()> {
        let changed = self.changed();
        if changed.is_empty() {
            return Err(Error::bad_request("no fields to update"));
        }
        if changed.contains(&TabField::Name) && self.tab.name.trim().is_empty() {
            return Err(Error::bad_request("tab name must not be empty"));
        }
        if changed.contains(&TabField::Url) {
            validate_url(&self.tab.url)?;
        }
        if changed.contains(&TabField::Meta) && !self.tab.meta.is_object() {
            return Err(Error::bad_request("tab meta must be a JSON object"));
        }
        Ok(())
    }
}

/// 检查将 `id` 挂到 `new_parent` 下是否会形成环
///
/// `parent_lineage` 是新父栏目自身及其祖先（见 [`super::Ancestry::lineage`]）。
pub fn check_reparent(id: i32, new_parent: Option<i32>, parent_lineage: &[Ancestor]) -> Result<()> {
    let Some(parent) = new_parent else {
        return Ok(());
    };
    if parent == id {
        return Err(Error::bad_request("a tab cannot be its own parent"));
    }
    if parent_lineage.is_empty() {
        return Err(Error::bad_request(format!("parent tab {parent} does not exist")));
    }
    if parent_lineage.iter().any(|a| a.id == id) {
        return Err(Error::bad_request(format!(
            "tab {parent} is a descendant of tab {id}"
        )));
    }
    Ok(())
}
