//! Filesystem side of the transfer stage

use super::paths::{TransferMode, TransferPlan};
use crate::error::{PipelineError, PipelineResult};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Mode applied to every transferred path
pub const LIBRARY_MODE: u32 = 0o775;

/// Owner applied to every transferred path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

/// Copy a payload into the library according to `plan`.
///
/// Runs on the blocking pool. On failure every path this attempt created is
/// removed again; directories that existed before are left alone.
pub async fn transfer_item(plan: TransferPlan, owner: Ownership) -> PipelineResult<()> {
    tokio::task::spawn_blocking(move || transfer_blocking(&plan, owner)).await?
}

fn transfer_blocking(plan: &TransferPlan, owner: Ownership) -> PipelineResult<()> {
    let mut created = Vec::new();
    let result = copy_payload(plan, owner, &mut created);

    if let Err(ref e) = result {
        tracing::warn!(target = %plan.target.display(), error = %e, "Rolling back partial transfer");
        for path in created.iter().rev() {
            let removed = if path.is_dir() {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            if let Err(cleanup) = removed {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove partial path");
                }
            }
        }
    }

    result
}

fn copy_payload(plan: &TransferPlan, owner: Ownership, created: &mut Vec<PathBuf>) -> PipelineResult<()> {
    let source_meta = fs::metadata(&plan.source).map_err(|e| {
        PipelineError::transfer(format!("source {} unavailable: {}", plan.source.display(), e))
    })?;

    // top-level paths this transfer wrote; existing siblings keep their owner
    let mut written = Vec::new();
    if source_meta.is_file() {
        create_dirs(&plan.target, created)?;
        let file_name = plan
            .source
            .file_name()
            .ok_or_else(|| PipelineError::transfer("source has no file name"))?;
        let dest = plan.target.join(file_name);
        if dest.is_dir() {
            fs::remove_dir_all(&dest)?;
        }
        if !dest.exists() {
            created.push(dest.clone());
        }
        fs::copy(&plan.source, &dest)?;
        written.push(dest);
    } else {
        match plan.mode {
            TransferMode::Overwrite => {
                if plan.target.exists() {
                    fs::remove_dir_all(&plan.target)?;
                }
                create_dirs(&plan.target, created)?;
                copy_tree(&plan.source, &plan.target)?;
                written.push(plan.target.clone());
            }
            TransferMode::Merge => {
                create_dirs(&plan.target, created)?;
                merge_tree(&plan.source, &plan.target, created, &mut written)?;
            }
        }
    }

    for path in created.iter() {
        set_owner_and_mode(path, owner)?;
    }
    for path in &written {
        apply_ownership(path, owner)?;
    }
    Ok(())
}

/// `create_dir_all`, remembering the topmost directory it had to create
fn create_dirs(dir: &Path, created: &mut Vec<PathBuf>) -> PipelineResult<()> {
    let first_missing = dir
        .ancestors()
        .take_while(|p| !p.exists())
        .last()
        .map(Path::to_path_buf);
    fs::create_dir_all(dir)?;
    if let Some(top) = first_missing {
        // record each level so ownership reaches intermediate parents too
        let rest = dir.strip_prefix(&top).map(Path::to_path_buf).unwrap_or_default();
        let mut current = top.clone();
        created.push(top);
        for component in rest.components() {
            current = current.join(component);
            created.push(current.clone());
        }
    }
    Ok(())
}

fn copy_tree(source: &Path, target: &Path) -> PipelineResult<()> {
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(|e| PipelineError::transfer(e.to_string()))?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| PipelineError::transfer(e.to_string()))?;
        let dest = target.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

/// Files overwrite their counterparts; subdirectories replace theirs
fn merge_tree(
    source: &Path,
    target: &Path,
    created: &mut Vec<PathBuf>,
    written: &mut Vec<PathBuf>,
) -> PipelineResult<()> {
    for entry in fs::read_dir(source)? {
        let entry = entry?;
        let dest = target.join(entry.file_name());
        let is_new = !dest.exists();

        if entry.file_type()?.is_dir() {
            if dest.exists() {
                fs::remove_dir_all(&dest)?;
            }
            fs::create_dir_all(&dest)?;
            if is_new {
                created.push(dest.clone());
            }
            copy_tree(&entry.path(), &dest)?;
        } else {
            if is_new {
                created.push(dest.clone());
            }
            fs::copy(entry.path(), &dest)?;
        }
        written.push(dest);
    }
    Ok(())
}

/// Recursively set owner and [`LIBRARY_MODE`] under `root`
pub fn apply_ownership(root: &Path, owner: Ownership) -> PipelineResult<()> {
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(|e| PipelineError::transfer(e.to_string()))?;
        set_owner_and_mode(entry.path(), owner)?;
    }
    Ok(())
}

#[cfg(unix)]
fn set_owner_and_mode(path: &Path, owner: Ownership) -> PipelineResult<()> {
    use std::os::unix::fs::PermissionsExt;

    std::os::unix::fs::chown(path, Some(owner.uid), Some(owner.gid)).map_err(|e| {
        PipelineError::transfer(format!(
            "chown {}:{} {} failed: {}",
            owner.uid,
            owner.gid,
            path.display(),
            e
        ))
    })?;
    fs::set_permissions(path, fs::Permissions::from_mode(LIBRARY_MODE))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_and_mode(_path: &Path, _owner: Ownership) -> PipelineResult<()> {
    Ok(())
}
