use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// 已上传文件的元数据
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DriveFile {
    pub id: i32,
    pub name: String,
    /// 存储中的相对路径
    pub path: String,
    pub mime: String,
    pub size: i64,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDriveFile {
    pub name: String,
    pub path: String,
    #[serde(default = "default_mime")]
    pub mime: String,
    pub size: i64,
}

fn default_mime() -> String {
    "application/octet-stream".to_string()
}

impl NewDriveFile {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::bad_request("file name must not be empty"));
        }
        if self.size < 0 {
            return Err(Error::bad_request("file size must not be negative"));
        }
        let path = self.path.trim_start_matches('/');
        if path.is_empty() || path.split('/').any(|seg| seg.is_empty() || seg == "..") {
            return Err(Error::bad_request("file path must be a relative path"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn file(path: &str) -> NewDriveFile {
        serde_json::from_value(json!({ "name": "logo.png", "path": path, "size": 10 })).unwrap()
    }

    #[test]
    fn test_validate_path() {
        assert!(file("uploads/2024/logo.png").validate().is_ok());
        assert_eq!(file("a.png").mime, "application/octet-stream");
        assert!(file("../etc/passwd").validate().is_err());
        assert!(file("uploads//x.png").validate().is_err());
        assert!(file("").validate().is_err());
    }
}
