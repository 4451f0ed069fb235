//! 栏目与文章的对外链接
//!
//! | 布局 | 栏目链接 | 文章链接 |
//! |---|---|---|
//! | `Article` | 栏目 URL | 栏目 URL |
//! | `None` | `#` | `#` |
//! | 其他 | 栏目 URL | `{栏目 URL}/{年份}/{文章 URL}` |

use super::{ancestry::Ancestor, tab::TabLayout};

/// 不可链接的标记，区别于“未设置”的空字符串
pub const DISABLED_LINK: &str = "#";

/// 栏目自身的链接
pub fn tab_link(layout: TabLayout, tab_url: &str) -> String {
    match layout {
        TabLayout::None => DISABLED_LINK.to_string(),
        _ => tab_url.to_string(),
    }
}

/// 栏目下某篇文章的链接
pub fn article_link(layout: TabLayout, tab_url: &str, article_url: &str, year: i32) -> String {
    match layout {
        TabLayout::Article => tab_url.to_string(),
        TabLayout::None => DISABLED_LINK.to_string(),
        _ => format!(
            "{}/{}/{}",
            tab_url.trim_end_matches('/'),
            year,
            article_url.trim_start_matches('/')
        ),
    }
}

/// 子栏目 URL 的前缀
///
/// `lineage` 从最近的栏目开始排列。取第一个可链接栏目的 URL，
/// `None` 布局的栏目不贡献前缀；全部不可链接时返回空。
pub fn nearest_prefix(lineage: &[Ancestor]) -> &str {
    lineage
        .iter()
        .find(|a| a.layout.is_linkable())
        .map(|a| a.url.as_str())
        .unwrap_or_default()
}

/// 拼接前缀和路径段，避免出现 `//`
pub fn join_segment(prefix: &str, segment: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), segment)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_LAYOUTS: [TabLayout; 8] = [
        TabLayout::Article,
        TabLayout::None,
        TabLayout::TitleList,
        TabLayout::TitleDescriptionList,
        TabLayout::LogoList,
        TabLayout::FullList,
        TabLayout::ContentList,
        TabLayout::Template,
    ];

    fn ancestor(id: i32, layout: TabLayout, url: &str, level: usize) -> Ancestor {
        Ancestor {
            id,
            parent: None,
            name: String::new(),
            layout,
            url: url.to_string(),
            level,
        }
    }

    #[test]
    fn test_none_layout_is_always_disabled() {
        let cases = [("/news", "launch", 2024), ("", "", 0), ("/", "x", 1999)];
        for (tab_url, article_url, year) in cases {
            assert_eq!(tab_link(TabLayout::None, tab_url), DISABLED_LINK);
            assert_eq!(
                article_link(TabLayout::None, tab_url, article_url, year),
                DISABLED_LINK
            );
        }
    }

    #[test]
    fn test_article_layout_collapses_to_tab() {
        assert_eq!(
            article_link(TabLayout::Article, "/about", "ignored", 2024),
            tab_link(TabLayout::Article, "/about")
        );
    }

    #[test]
    fn test_list_layouts_compose_year_path() {
        assert_eq!(
            article_link(TabLayout::TitleList, "/news", "launch", 2024),
            "/news/2024/launch"
        );
        for layout in ALL_LAYOUTS.into_iter().filter(|l| (*l as i16) >= 2) {
            assert_eq!(article_link(layout, "/news", "launch", 2024), "/news/2024/launch");
            assert_eq!(tab_link(layout, "/news"), "/news");
        }
    }

    #[test]
    fn test_root_tab_has_no_double_slash() {
        assert_eq!(
            article_link(TabLayout::FullList, "/", "hello", 2023),
            "/2023/hello"
        );
    }

    #[test]
    fn test_nearest_prefix_skips_unlinkable() {
        let lineage = vec![
            ancestor(3, TabLayout::None, "/news/world", 0),
            ancestor(2, TabLayout::TitleList, "/news", 1),
            ancestor(1, TabLayout::Article, "/", 2),
        ];
        assert_eq!(nearest_prefix(&lineage), "/news");
        assert_eq!(nearest_prefix(&lineage[..1]), "");
        assert_eq!(nearest_prefix(&[]), "");
    }

    #[test]
    fn test_join_segment() {
        assert_eq!(join_segment("/news", "world"), "/news/world");
        assert_eq!(join_segment("/", "world"), "/world");
        assert_eq!(join_segment("", "world"), "/world");
    }
}
