//! Mapping between filesystem paths and archive entry names.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// How sources outside the archive root are named.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NamePolicy {
    /// Remove every literal `"../"` from the relative name. This matches the
    /// names produced by the classic tool, including its quirk of also
    /// rewriting directory names that merely end in `..`.
    #[default]
    StripParentRefs,
    /// Skip sources that do not live below the root.
    RejectOutsideRoot,
}

/// Compute the archive name of `source` relative to `root`.
///
/// Both paths are made absolute against the current directory and normalized
/// lexically. Callers resolve symlinks first with [`physical_path`] and
/// [`physical_source`].
pub fn archive_name(root: &Path, source: &Path, policy: NamePolicy) -> Result<String> {
    let root = normalize(&absolute(root)?);
    let full = normalize(&absolute(source)?);

    let root_parts: Vec<_> = root.components().collect();
    let source_parts: Vec<_> = full.components().collect();
    let common = root_parts
        .iter()
        .zip(&source_parts)
        .take_while(|(a, b)| a == b)
        .count();
    let ups = root_parts.len() - common;

    if ups > 0 && policy == NamePolicy::RejectOutsideRoot {
        return Err(Error::OutsideRoot(source.to_path_buf()));
    }

    let mut segments = vec![".."; ups];
    for component in &source_parts[common..] {
        match component {
            Component::Normal(part) => segments.push(
                part.to_str()
                    .ok_or_else(|| Error::NonUtf8Path(source.to_path_buf()))?,
            ),
            // Different drive or root: there is no relative path.
            _ => return Err(Error::OutsideRoot(source.to_path_buf())),
        }
    }

    let mut name = segments.join("/");
    if policy == NamePolicy::StripParentRefs {
        strip_parent_refs(&mut name);
    }

    if name.is_empty() {
        return Err(Error::EmptyName);
    }
    Ok(name)
}

/// Resolve `path` to its physical location, following symlinks.
///
/// Paths that cannot be canonicalized (e.g. because they do not exist) fall
/// back to the lexically normalized absolute path.
pub async fn physical_path(path: &Path) -> Result<PathBuf> {
    let full = normalize(&absolute(path)?);
    Ok(tokio::fs::canonicalize(&full).await.unwrap_or(full))
}

/// Resolve the directory containing `source`, keeping its final component.
///
/// A symlinked file keeps its own name; symlinked directories on the way to
/// it are resolved.
pub async fn physical_source(source: &Path) -> Result<PathBuf> {
    let full = normalize(&absolute(source)?);
    match (full.parent(), full.file_name()) {
        (Some(parent), Some(file_name)) => Ok(physical_path(parent).await?.join(file_name)),
        _ => Ok(full),
    }
}

/// Remove `"../"` wherever it occurs until none is left.
fn strip_parent_refs(name: &mut String) {
    while let Some(pos) = name.find("../") {
        name.replace_range(pos..pos + 3, "");
    }
}

/// Join `name` onto `output_dir`, refusing names that would leave it.
pub fn resolve_destination(output_dir: &Path, name: &str) -> Result<PathBuf> {
    let mut dest = output_dir.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                dest.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::PathTraversal(name.to_owned()));
            }
        }
    }

    if depth == 0 {
        return Err(Error::EmptyName);
    }
    Ok(dest)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|source| Error::Metadata {
        path: path.to_path_buf(),
        source,
    })
}

/// Drop `.` components and fold `..` into its parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
