/// Application name, used for platform directories.
pub const APP_NAME: &str = "upcheck";

/// Environment variable overriding the state directory.
pub const STATE_DIR_ENV: &str = "UPCHECK_STATE_DIR";

/// Optional per-solution configuration file.
pub const CONFIG_FILENAME: &str = "upcheck.json";

/// Name of the unnamed default set of inputs and outputs.
pub const DEFAULT_SET: &str = "";

/// Configuration dimension holding the target framework.
pub const TARGET_FRAMEWORK_DIMENSION: &str = "TargetFramework";

/// Suffix of copies staged beside their destination during acceleration.
pub const STAGED_COPY_SUFFIX: &str = ".upcheck-tmp";

/// Suffix of destinations set aside while a batch of copies is committed.
pub const SET_ASIDE_SUFFIX: &str = ".upcheck-bak";
