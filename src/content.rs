pub mod ancestry;
pub mod article;
pub mod drive;
pub mod link;
pub mod plugin;
pub mod slug;
pub mod tab;
pub mod user;
pub mod website;

pub use self::{
    ancestry::{Ancestor, Ancestry, TabNode, TabSource},
    article::{
        Article, ArticleField, ArticleInput, ArticleLink, ArticlePatch, ArticleStatus, LinkedTab,
    },
    drive::{DriveFile, NewDriveFile},
    plugin::{Plugin, PluginRegistry, PluginSchema},
    slug::Translator,
    tab::{Tab, TabField, TabInput, TabLayout, TabPatch},
    user::{Credentials, Role, User, UserField, UserInput, UserPatch},
    website::Website,
};
