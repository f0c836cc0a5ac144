//! Fixed names inside the aptsync root

/// Created under the home directory when `rootPath` is not set
pub const DEFAULT_ROOT_DIR: &str = "aptsync";

pub const MIRROR_DIR: &str = "mirror";
pub const SKEL_DIR: &str = "skel";
pub const VAR_DIR: &str = "var";
pub const LOCK_DIR: &str = "lock";

/// Extension of the file a transfer writes before moving it into place
pub const PARTIAL_SUFFIX: &str = "partial";

pub const CONFIG_FILE: &str = "aptsync.conf";

/// Prefix of environment overrides
pub const ENV_PREFIX: &str = "APTSYNC_";
