pub mod paths;

/// Whether path comparisons on this platform ignore case.
pub const CASE_INSENSITIVE_PATHS: bool = cfg!(any(windows, target_os = "macos"));
