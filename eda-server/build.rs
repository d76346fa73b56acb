//! Stamps eda-server with where and how it was built
//!
//! Exposed to the crate as `EDA_*` compile-time env vars and read back
//! through `api::buildinfo::BuildInfo::current`.

use std::process::Command;

/// Trimmed stdout of a successful git call
fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|text| text.trim().to_string())
}

fn main() {
    let commit = git(&["rev-parse", "--short=8", "HEAD"]);
    // uncommitted edits make the commit id misleading
    let dirty = commit.is_some()
        && git(&["status", "--porcelain", "--untracked-files=no"])
            .is_some_and(|status| !status.is_empty());

    let env = |name: &str| std::env::var(name).unwrap_or_else(|_| "unknown".to_string());
    let stamps = [
        ("EDA_GIT_COMMIT", commit.unwrap_or_else(|| "unknown".to_string())),
        ("EDA_GIT_DIRTY", dirty.to_string()),
        (
            "EDA_BUILT_AT",
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        ),
        ("EDA_BUILD_PROFILE", env("PROFILE")),
        ("EDA_BUILD_TARGET", env("TARGET")),
    ];
    for (key, value) in stamps {
        println!("cargo:rustc-env={}={}", key, value);
    }

    // no rerun-if-changed: the stamp is refreshed on every build
}
