// src/fsutil.rs

//! Small filesystem helpers shared by the cache store and recipe hooks

use crate::error::Result;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Recursively copy a directory tree, creating the destination as needed
///
/// Returns the number of files copied. Symlinks are followed.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| {
            std::io::Error::other(format!("walk failed under {}: {}", src.display(), e))
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_tree_preserves_layout() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("include/sub")).unwrap();
        fs::write(src.join("include/header.h"), "my header h!!").unwrap();
        fs::write(src.join("include/sub/inner.h"), "inner").unwrap();

        let dst = dir.path().join("dst");
        let copied = copy_tree(&src, &dst).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(
            fs::read_to_string(dst.join("include/header.h")).unwrap(),
            "my header h!!"
        );
        assert!(dst.join("include/sub/inner.h").exists());
    }

    #[test]
    fn test_copy_empty_tree() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("empty");
        fs::create_dir_all(&src).unwrap();
        let dst = dir.path().join("out");
        assert_eq!(copy_tree(&src, &dst).unwrap(), 0);
        assert!(dst.exists());
    }
}
