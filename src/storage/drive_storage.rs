use chrono::{DateTime, Local};

use super::Db;
use crate::{
    content::{DriveFile, NewDriveFile},
    error::{Error, Result},
};

/// 文件元数据的数据库操作接口
pub trait DriveRepository: Send + Sync {
    /// 最新上传的在前
    fn list_files(&self) -> impl Future<Output = Result<Vec<DriveFile>>> + Send;

    fn create_file(
        &self,
        file: &NewDriveFile,
        now: DateTime<Local>,
    ) -> impl Future<Output = Result<DriveFile>> + Send;

    fn delete_file(&self, id: i32) -> impl Future<Output = Result<()>> + Send;
}

impl DriveRepository for Db {
    async fn list_files(&self) -> Result<Vec<DriveFile>> {
        let files = sqlx::query_as::<_, DriveFile>(
            "SELECT * FROM drive_files ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(self)
        .await?;
        Ok(files)
    }

    async fn create_file(&self, file: &NewDriveFile, now: DateTime<Local>) -> Result<DriveFile> {
        let file = sqlx::query_as::<_, DriveFile>(
            r#"
            INSERT INTO drive_files (name, path, mime, size, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(file.name.trim())
        .bind(file.path.trim_start_matches('/'))
        .bind(&file.mime)
        .bind(file.size)
        .bind(now)
        .fetch_one(self)
        .await?;
        Ok(file)
    }

    async fn delete_file(&self, id: i32) -> Result<()> {
        let result = sqlx::query("DELETE FROM drive_files WHERE id = $1")
            .bind(id)
            .execute(self)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound("file"));
        }
        Ok(())
    }
}
