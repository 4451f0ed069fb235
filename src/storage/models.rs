use chrono::{DateTime, Local};

use crate::content::{Article, ArticleLink, LinkedTab, TabLayout};

/// 文章及其三个关联栏目的布局和 URL
///
/// 由 [`super::ArticleRepository`] 的查询返回，用于计算 [`ArticleLink`]。
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArticleRow {
    #[sqlx(flatten)]
    pub article: Article,
    pub tab_layout: Option<TabLayout>,
    pub tab_url: Option<String>,
    pub tab2_layout: Option<TabLayout>,
    pub tab2_url: Option<String>,
    pub tab3_layout: Option<TabLayout>,
    pub tab3_url: Option<String>,
}

impl ArticleRow {
    /// 链接投影，缺失的栏目被跳过
    pub fn link(&self) -> ArticleLink {
        let a = &self.article;
        let tabs = [
            (Some(a.tab_id), self.tab_layout, &self.tab_url),
            (a.tab_id2, self.tab2_layout, &self.tab2_url),
            (a.tab_id3, self.tab3_layout, &self.tab3_url),
        ]
        .into_iter()
        .filter_map(|(id, layout, url)| {
            Some(LinkedTab {
                id: id?,
                layout: layout?,
                url: url.clone()?,
            })
        })
        .collect();

        ArticleLink {
            url: a.url.clone(),
            year: a.year(),
            tabs,
        }
    }
}

/// 插件配置记录
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PluginRecord {
    pub id: String,
    pub enabled: bool,
    pub config: serde_json::Value,
    pub updated_at: DateTime<Local>,
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::content::ArticleStatus;

    fn row() -> ArticleRow {
        let at = Local.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap();
        ArticleRow {
            article: Article {
                id: 1,
                tab_id: 2,
                tab_id2: Some(3),
                tab_id3: Some(4),
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
            },
            tab_layout: Some(TabLayout::TitleList),
            tab_url: Some("/news".into()),
            tab2_layout: Some(TabLayout::Article),
            tab2_url: Some("/about".into()),
            // 第三个栏目已被删除，连接结果为空
            tab3_layout: None,
            tab3_url: None,
        }
    }

    #[test]
    fn test_link_projection() {
        let link = row().link();
        assert_eq!(link.year, 2024);
        assert_eq!(link.tabs.len(), 2);
        assert_eq!(link.canonical(), "/news/2024/launch");
        assert_eq!(link.all(), vec!["/news/2024/launch", "/about"]);
    }
}
