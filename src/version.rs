//! Build identity reported by `njalld` at startup and by `njall --version`.
//!
//! `build.rs` embeds git metadata through vergen; builds outside a git
//! checkout fall back to `unknown`.

/// Crate version, e.g. `0.1.0`.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Branch njall was built from.
pub const GIT_BRANCH: &str = match option_env!("VERGEN_GIT_BRANCH") {
    Some(branch) => branch,
    None => "unknown",
};

/// Full commit SHA njall was built from.
pub const GIT_SHA: &str = match option_env!("VERGEN_GIT_SHA") {
    Some(sha) => sha,
    None => "unknown",
};

const SHORT_SHA_LEN: usize = 7;

/// Whether the build had uncommitted changes.
pub fn git_dirty() -> bool {
    option_env!("VERGEN_GIT_DIRTY") == Some("true")
}

/// Version logged by njalld, e.g. `0.1.0+main.1a2b3c4` or
/// `0.1.0+main.1a2b3c4.dirty`.
pub fn version_string() -> String {
    format_version(PKG_VERSION, GIT_BRANCH, GIT_SHA, git_dirty())
}

fn format_version(version: &str, branch: &str, sha: &str, dirty: bool) -> String {
    let short_sha: String = sha.chars().take(SHORT_SHA_LEN).collect();
    let suffix = if dirty { ".dirty" } else { "" };
    format!("{version}+{branch}.{short_sha}{suffix}")
}
