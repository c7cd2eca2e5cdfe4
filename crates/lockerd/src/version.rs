//! Version reporting.

/// Pre-release suffix appended to the crate version.
const VERSION_SUFFIX: &str = "dev";

/// Git commit baked in by the build environment, if any.
const GIT_COMMIT: Option<&str> = option_env!("LOCKERD_GIT_COMMIT");

/// Humanly readable version.
pub fn human_version() -> String {
    let mut version = env!("CARGO_PKG_VERSION").to_string();

    if !VERSION_SUFFIX.is_empty() {
        version.push('-');
        version.push_str(VERSION_SUFFIX);
    }

    if let Some(commit) = GIT_COMMIT {
        version.push_str(" (");
        version.push_str(commit);
        version.push(')');
    }

    version
}
