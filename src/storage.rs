mod article_storage;
mod drive_storage;
mod models;
mod plugin_storage;
mod postgres;
mod tab_storage;
mod user_storage;
mod website_storage;

pub use self::{
    article_storage::{ArticleFilter, ArticleRepository},
    drive_storage::DriveRepository,
    models::{ArticleRow, PluginRecord},
    plugin_storage::PluginRepository,
    postgres::{Db, migrate, new_db_pool},
    tab_storage::TabRepository,
    user_storage::UserRepository,
    website_storage::WebsiteRepository,
};
