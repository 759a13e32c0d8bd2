//! Build metadata stamped in by `build.rs`.

use std::fmt;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

const UNKNOWN: &str = "unknown";

/// Where and from what this binary was built.
///
/// Every field falls back to `"unknown"` when the build ran outside a git
/// checkout or without vergen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub branch: &'static str,
    pub commit: &'static str,
    pub dirty: bool,
    pub built_at: &'static str,
    pub target: &'static str,
}

impl BuildInfo {
    /// Metadata of the running build.
    pub fn current() -> Self {
        Self {
            version: PKG_VERSION,
            branch: or_unknown(option_env!("VERGEN_GIT_BRANCH")),
            commit: or_unknown(option_env!("VERGEN_GIT_SHA")),
            dirty: matches!(option_env!("VERGEN_GIT_DIRTY"), Some("true")),
            built_at: or_unknown(option_env!("VERGEN_BUILD_TIMESTAMP")),
            target: or_unknown(option_env!("VERGEN_CARGO_TARGET_TRIPLE")),
        }
    }

    /// Commit hash cut to seven characters.
    pub fn short_commit(&self) -> &'static str {
        let end = self
            .commit
            .char_indices()
            .nth(7)
            .map_or(self.commit.len(), |(i, _)| i);
        &self.commit[..end]
    }

    /// Multi-line report for `--version`.
    pub fn long_version(&self) -> String {
        format!(
            "{self}\ncommit:  {}\nbuilt:   {}\ntarget:  {}",
            self.commit, self.built_at, self.target
        )
    }
}

impl fmt::Display for BuildInfo {
    /// `{version}+{branch}.{sha}`, with `.dirty` appended for a dirty tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}.{}", self.version, self.branch, self.short_commit())?;
        if self.dirty {
            f.write_str(".dirty")?;
        }
        Ok(())
    }
}

const fn or_unknown(value: Option<&'static str>) -> &'static str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => UNKNOWN,
    }
}

/// One-line version of the running build, e.g. `0.1.0+main.abc1234`.
pub fn version_string() -> String {
    BuildInfo::current().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(dirty: bool) -> BuildInfo {
        BuildInfo {
            version: "0.3.1",
            branch: "feature/voice",
            commit: "abc1234def5678",
            dirty,
            built_at: "2026-05-01T10:00:00Z",
            target: "x86_64-unknown-linux-gnu",
        }
    }

    #[test]
    fn display_shortens_commit() {
        assert_eq!(sample(false).to_string(), "0.3.1+feature/voice.abc1234");
        assert_eq!(sample(true).to_string(), "0.3.1+feature/voice.abc1234.dirty");
    }

    #[test]
    fn short_commit_keeps_short_values() {
        let info = BuildInfo {
            commit: UNKNOWN,
            ..sample(false)
        };
        assert_eq!(info.short_commit(), "unknown");
    }

    #[test]
    fn long_version_lists_build_details() {
        let long = sample(false).long_version();
        assert!(long.starts_with("0.3.1+feature/voice.abc1234\n"));
        assert!(long.contains("commit:  abc1234def5678"));
        assert!(long.contains("target:  x86_64-unknown-linux-gnu"));
    }

    #[test]
    fn current_build_starts_with_package_version() {
        assert!(version_string().starts_with(PKG_VERSION));
    }
}
