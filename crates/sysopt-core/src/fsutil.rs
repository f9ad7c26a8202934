//! Read-only filesystem helpers shared by the planner and the forecaster

use std::fs;
use std::path::Path;

/// Sum of regular file sizes under `root`, descending at most `max_depth`
/// directory levels. Symlinks are not followed; unreadable entries are skipped.
pub fn directory_size(root: &Path, max_depth: usize) -> u64 {
    let Ok(entries) = fs::read_dir(root) else {
        return 0;
    };

    let mut total = 0u64;
    for entry in entries.flatten() {
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_file() {
            if let Ok(meta) = entry.metadata() {
                total = total.saturating_add(meta.len());
            }
        } else if file_type.is_dir() && max_depth > 0 {
            total = total.saturating_add(directory_size(&entry.path(), max_depth - 1));
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_directory_size_respects_depth() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a"), vec![0u8; 10]).unwrap();
        fs::create_dir_all(dir.path().join("x/y")).unwrap();
        fs::write(dir.path().join("x/b"), vec![0u8; 20]).unwrap();
        fs::write(dir.path().join("x/y/c"), vec![0u8; 40]).unwrap();

        assert_eq!(directory_size(dir.path(), 0), 10);
        assert_eq!(directory_size(dir.path(), 1), 30);
        assert_eq!(directory_size(dir.path(), 5), 70);
    }

    #[test]
    fn test_directory_size_missing_root() {
        assert_eq!(directory_size(Path::new("/no/such/sysopt/dir"), 3), 0);
    }
}
