//! Download placement: a hash-named landing path in a staging directory,
//! then a no-clobber move to the object's human-readable name.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Sanitizes a manifest name for use as a single Linux path component.
///
/// - Replaces NUL, `/`, `\`, and control characters with `_`
/// - Trims leading/trailing spaces, dots and underscores
/// - Collapses consecutive underscores
/// - Limits length to 255 bytes (Linux NAME_MAX)
pub fn sanitize_filename(name: &str) -> String {
    const NAME_MAX: usize = 255;

    let mut out = String::with_capacity(name.len());
    let mut prev_underscore = false;
    for c in name.chars() {
        let c = if c == '\0' || c == '/' || c == '\\' || c.is_control() {
            '_'
        } else {
            c
        };
        if c == '_' {
            if !prev_underscore {
                out.push('_');
            }
            prev_underscore = true;
        } else {
            out.push(c);
            prev_underscore = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');
    let mut take = trimmed.len().min(NAME_MAX);
    while take > 0 && !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}

/// Staging directory drivers land content in before it is placed.
/// Sanitized names never start with a dot, so no entry is ever placed here.
pub const LANDING_DIR: &str = ".landing";

/// Where content with hash `hash` lands: `dest_dir/.landing/<hash>`.
/// `None` if the hash is not usable as a single path component.
pub fn landing_path(dest_dir: &Path, hash: &str) -> Option<PathBuf> {
    let hash = hash.trim();
    if hash.is_empty()
        || hash.starts_with('.')
        || hash.contains(|c: char| c == '/' || c == '\\' || c == '\0')
    {
        return None;
    }
    Some(dest_dir.join(LANDING_DIR).join(hash))
}

/// Move downloaded content from its hash-named landing path to `dir/<name>`
/// unless that name is taken. Returns where the content ended up.
///
/// Files use a hard link plus unlink so an existing target is never replaced.
/// Directories fall back to an existence check followed by rename.
pub async fn place_download(landed: &Path, dir: &Path, name: &str) -> Result<PathBuf> {
    let clean = sanitize_filename(name);
    if clean.is_empty() {
        return Ok(landed.to_path_buf());
    }
    let target = dir.join(&clean);
    if target == landed {
        return Ok(target);
    }

    let meta = tokio::fs::metadata(landed)
        .await
        .with_context(|| format!("stat downloaded content: {}", landed.display()))?;

    if meta.is_dir() {
        if tokio::fs::try_exists(&target).await.unwrap_or(true) {
            return Ok(landed.to_path_buf());
        }
        tokio::fs::rename(landed, &target)
            .await
            .with_context(|| format!("rename {} -> {}", landed.display(), target.display()))?;
        return Ok(target);
    }

    match tokio::fs::hard_link(landed, &target).await {
        Ok(()) => {
            tokio::fs::remove_file(landed)
                .await
                .with_context(|| format!("remove {}", landed.display()))?;
            Ok(target)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(landed.to_path_buf()),
        Err(e) => {
            tracing::debug!(target = %target.display(), "hard link failed, keeping hash name: {}", e);
            Ok(landed.to_path_buf())
        }
    }
}
