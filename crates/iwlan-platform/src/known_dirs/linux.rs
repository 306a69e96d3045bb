use crate::BUNDLE_ID;
use std::path::PathBuf;

/// e.g. `/home/alice/.cache/dev.iwlan.daemon/logs`
pub fn logs() -> Option<PathBuf> {
    Some(dirs::cache_dir()?.join(BUNDLE_ID).join("logs"))
}

/// e.g. `/run/dev.iwlan.daemon`
///
/// System-wide runtime directory, typically root-owned.
#[expect(clippy::unnecessary_wraps)]
pub fn root_runtime() -> Option<PathBuf> {
    Some(PathBuf::from("/run").join(BUNDLE_ID))
}

/// e.g. `/home/alice/.local/share/dev.iwlan.daemon/data`
pub fn session() -> Option<PathBuf> {
    Some(dirs::data_local_dir()?.join(BUNDLE_ID).join("data"))
}

/// e.g. `/home/alice/.config/dev.iwlan.daemon/config`
///
/// Carrier-config JSON document and other per-slot policy inputs live here.
pub fn settings() -> Option<PathBuf> {
    Some(dirs::config_local_dir()?.join(BUNDLE_ID).join("config"))
}
