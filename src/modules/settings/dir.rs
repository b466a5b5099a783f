use crate::modules::context::Initialize;
use crate::modules::settings::cli::SETTINGS;
use crate::{
    modules::error::{code::ErrorCode, GatewayResult},
    raise_error,
};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

const LOG_DIR: &str = "logs";

pub static DATA_DIR_MANAGER: LazyLock<DataDirManager> = LazyLock::new(|| {
    DataDirManager::new(
        PathBuf::from(&SETTINGS.gateway_root_dir),
        &SETTINGS.gateway_identity_file,
        &SETTINGS.gateway_assets_dir,
        &SETTINGS.gateway_uploads_dir,
    )
});

#[derive(Debug)]
pub struct DataDirManager {
    pub root_dir: PathBuf,
    pub identity_file: PathBuf,
    pub assets_dir: PathBuf,
    pub uploads_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Initialize for DataDirManager {
    async fn initialize() -> GatewayResult<()> {
        for dir in [
            &DATA_DIR_MANAGER.root_dir,
            &DATA_DIR_MANAGER.uploads_dir,
            &DATA_DIR_MANAGER.log_dir,
        ] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                raise_error!(
                    format!("Failed to create directory {:?}: {:#?}", dir, e),
                    ErrorCode::InternalError
                )
            })?;
        }
        Ok(())
    }
}

impl DataDirManager {
    pub fn new(root_dir: PathBuf, identity_file: &str, assets_dir: &str, uploads_dir: &str) -> Self {
        Self {
            identity_file: resolve(&root_dir, identity_file),
            assets_dir: resolve(&root_dir, assets_dir),
            uploads_dir: resolve(&root_dir, uploads_dir),
            log_dir: root_dir.join(LOG_DIR),
            root_dir,
        }
    }
}

/// Absolute paths are kept, relative ones are joined onto `root`.
fn resolve(root: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn relative_paths_resolve_under_root() {
        let manager = DataDirManager::new(
            PathBuf::from("/srv/gateway"),
            "appSettings.json",
            "assets",
            "uploads",
        );
        assert_eq!(manager.identity_file, PathBuf::from("/srv/gateway/appSettings.json"));
        assert_eq!(manager.assets_dir, PathBuf::from("/srv/gateway/assets"));
        assert_eq!(manager.uploads_dir, PathBuf::from("/srv/gateway/uploads"));
        assert_eq!(manager.log_dir, PathBuf::from("/srv/gateway/logs"));
    }

    #[test]
    fn absolute_paths_are_kept() {
        let temp_dir = tempdir().unwrap();
        let uploads = temp_dir.path().join("spool");
        let manager = DataDirManager::new(
            PathBuf::from("/srv/gateway"),
            "appSettings.json",
            "assets",
            uploads.to_str().unwrap(),
        );
        assert_eq!(manager.uploads_dir, uploads);
        assert_eq!(manager.assets_dir, PathBuf::from("/srv/gateway/assets"));
    }
}
