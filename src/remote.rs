mod revalidate;
mod translate;

pub use self::{
    revalidate::{Revalidator, revalidate_quietly},
    translate::HttpTranslator,
};

/// 所有外部请求使用的 User-Agent
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
