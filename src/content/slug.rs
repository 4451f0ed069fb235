use crate::error::Result;

use super::link::join_segment;

/// 根栏目上这些名称对应站点首页，URL 为空
const HOME_NAMES: [&str; 2] = ["home", "frontpage"];

/// 把文本翻译为英文（ASCII 近似）
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// 把文本转换为 URL 路径段
///
/// 小写化，`[0-9a-z_-]` 之外的字符视为分隔符，连续分隔符合并为一个 `-`，并去掉首尾分隔符。
pub fn strip_segment(text: &str) -> String {
    let mut segment = String::with_capacity(text.len());
    let mut pending_sep = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' {
            if pending_sep && !segment.is_empty() {
                segment.push('-');
            }
            pending_sep = false;
            segment.push(c);
        } else {
            pending_sep = true;
        }
    }
    segment
}

/// 根据栏目名称建议 URL
///
/// - 纯 ASCII 名称直接转换，不调用翻译服务
/// - 其他名称先翻译一次再转换；翻译失败时不给出建议
/// - 根栏目上的 `home` / `frontpage` 返回空字符串，即站点根
/// - 有父栏目时结果为 `{parent_prefix}/{segment}`
///
/// 返回 `None` 表示没有建议，由用户手动填写。
pub async fn suggest_url<T: Translator>(
    name: &str,
    parent_prefix: Option<&str>,
    translator: &T,
) -> Option<String> {
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let segment = if name.is_ascii() {
        strip_segment(name)
    } else {
        match translator.translate(name).await {
            Ok(translated) => strip_segment(&translated),
            Err(e) => {
                tracing::warn!(%e, name, "translation failed, no url suggestion");
                return None;
            }
        }
    };

    match parent_prefix {
        None if HOME_NAMES.contains(&segment.as_str()) => Some(String::new()),
        _ if segment.is_empty() => None,
        None => Some(segment),
        Some(prefix) => Some(join_segment(prefix, &segment)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::Error;

    /// 记录调用次数的翻译器
    struct FakeTranslator {
        reply: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl FakeTranslator {
        fn replying(reply: &'static str) -> Self {
            Self {
                reply: Some(reply),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Translator for FakeTranslator {
        async fn translate(&self, _text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.reply
                .map(str::to_string)
                .ok_or_else(|| Error::Upstream("translation timed out".into()))
        }
    }

    #[test]
    fn test_strip_segment() {
        assert_eq!(strip_segment("News & Events"), "news-events");
        assert_eq!(strip_segment("  Hello,   World!  "), "hello-world");
        assert_eq!(strip_segment("snake_case-Name"), "snake_case-name");
        assert_eq!(strip_segment("--a--b--"), "a-b");
        assert_eq!(strip_segment("2024 Report"), "2024-report");
        assert_eq!(strip_segment("&&&"), "");
    }

    #[tokio::test]
    async fn test_ascii_name_skips_translation() {
        let translator = FakeTranslator::replying("unused");
        let url = suggest_url("News & Events", None, &translator).await;
        assert_eq!(url.as_deref(), Some("news-events"));
        assert_eq!(translator.calls(), 0);
    }

    #[tokio::test]
    async fn test_home_at_root_is_empty() {
        let translator = FakeTranslator::replying("unused");
        assert_eq!(suggest_url("Home", None, &translator).await.as_deref(), Some(""));
        assert_eq!(
            suggest_url("FrontPage", None, &translator).await.as_deref(),
            Some("")
        );
        // 非根栏目不做特殊处理
        assert_eq!(
            suggest_url("Home", Some("/about"), &translator).await.as_deref(),
            Some("/about/home")
        );
    }

    #[tokio::test]
    async fn test_parent_prefix() {
        let translator = FakeTranslator::replying("unused");
        assert_eq!(
            suggest_url("World News", Some("/news"), &translator)
                .await
                .as_deref(),
            Some("/news/world-news")
        );
        assert_eq!(
            suggest_url("World", Some("/"), &translator).await.as_deref(),
            Some("/world")
        );
    }

    #[tokio::test]
    async fn test_non_ascii_translates_once() {
        let translator = FakeTranslator::replying("Company News");
        let url = suggest_url("公司新闻", None, &translator).await;
        assert_eq!(url.as_deref(), Some("company-news"));
        assert_eq!(translator.calls(), 1);

        let translator = FakeTranslator::replying("Home");
        assert_eq!(suggest_url("首页", None, &translator).await.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_translation_failure_gives_no_suggestion() {
        let translator = FakeTranslator::failing();
        assert_eq!(suggest_url("公司新闻", None, &translator).await, None);
        assert_eq!(translator.calls(), 1);

        let translator = FakeTranslator::replying("？？");
        assert_eq!(suggest_url("公司新闻", Some("/news"), &translator).await, None);
    }

    #[tokio::test]
    async fn test_blank_name() {
        let translator = FakeTranslator::replying("unused");
        assert_eq!(suggest_url("   ", None, &translator).await, None);
        assert_eq!(suggest_url("&&&", None, &translator).await, None);
        assert_eq!(translator.calls(), 0);
    }
}
