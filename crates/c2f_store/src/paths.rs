use directories::ProjectDirs;
use std::path::PathBuf;

use crate::error::StoreError;

pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "click2fetch";
pub const APP_NAME: &str = "Click2Fetch";
pub const DB_FILE_NAME: &str = "secrets.db";

/// Environment variable that overrides the database location.
pub const DB_PATH_ENV: &str = "C2F_DB_PATH";

pub fn data_dir() -> Result<PathBuf, StoreError> {
    let dirs = ProjectDirs::from(APP_QUALIFIER, APP_ORG, APP_NAME).ok_or(StoreError::NoDataDir)?;
    Ok(dirs.data_dir().to_path_buf())
}

/// `$C2F_DB_PATH` if set, otherwise `secrets.db` in the per-user data dir.
pub fn default_db_path() -> Result<PathBuf, StoreError> {
    if let Some(override_path) = std::env::var_os(DB_PATH_ENV).filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(override_path));
    }
    Ok(data_dir()?.join(DB_FILE_NAME))
}
