//! Version tag publishing
//!
//! Reads the workspace version from the manifest and tags the current commit
//! `v<version>` unless that tag already exists.

use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

/// What `publish_tag` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagOutcome {
    Created(String),
    AlreadyExists(String),
    DryRun(String),
}

/// `workspace.package.version`, falling back to `package.version`
pub fn read_version(manifest: &str) -> Result<String> {
    let doc: toml::Table = toml::from_str(manifest).context("Manifest is not valid TOML")?;

    let version = doc
        .get("workspace")
        .and_then(|w| w.get("package"))
        .and_then(|p| p.get("version"))
        .or_else(|| doc.get("package").and_then(|p| p.get("version")))
        .and_then(|v| v.as_str())
        .context("Manifest has no workspace.package.version or package.version")?;

    if !is_valid_version(version) {
        bail!("'{}' is not a MAJOR.MINOR.PATCH version", version);
    }
    Ok(version.to_string())
}

/// `MAJOR.MINOR.PATCH` with an optional `-prerelease` suffix
pub fn is_valid_version(version: &str) -> bool {
    let (core, pre) = match version.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (version, None),
    };

    let numeric = |part: &str| {
        !part.is_empty()
            && part.bytes().all(|b| b.is_ascii_digit())
            && (part == "0" || !part.starts_with('0'))
    };
    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() != 3 || !parts.iter().all(|p| numeric(p)) {
        return false;
    }

    match pre {
        None => true,
        Some(pre) => pre
            .split('.')
            .all(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')),
    }
}

pub fn tag_name(version: &str) -> String {
    format!("v{}", version)
}

/// Decide whether `tag` needs creating, given `git tag --list` output
pub fn tag_exists(existing: &str, tag: &str) -> bool {
    existing.lines().any(|line| line.trim() == tag)
}

fn git(repo: &Path, args: &[&str]) -> Result<String> {
    debug!("git {}", args.join(" "));
    let output = Command::new("git")
        .args(args)
        .current_dir(repo)
        .output()
        .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Tag HEAD with the manifest version when the tag is new, optionally pushing it
pub fn publish_tag(manifest_path: &Path, push: bool, dry_run: bool) -> Result<TagOutcome> {
    let manifest = std::fs::read_to_string(manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
    let version = read_version(&manifest)?;
    let tag = tag_name(&version);

    let repo = manifest_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let existing = git(repo, &["tag", "--list"])?;
    if tag_exists(&existing, &tag) {
        info!("Tag {} already exists, nothing to do", tag);
        return Ok(TagOutcome::AlreadyExists(tag));
    }

    if dry_run {
        info!("Would create tag {}", tag);
        return Ok(TagOutcome::DryRun(tag));
    }

    git(repo, &["tag", &tag])?;
    info!("Created tag {}", tag);

    if push {
        git(repo, &["push", "origin", &tag])?;
        info!("Pushed tag {}", tag);
    }
    Ok(TagOutcome::Created(tag))
}
