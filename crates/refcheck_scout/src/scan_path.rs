use std::fmt;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPathError {
    NotFound(PathBuf),
    NotDirectory(PathBuf),
    NotReadable(PathBuf),
}

impl fmt::Display for ScanPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPathError::NotFound(path) => write!(f, "Path not found: {}", path.display()),
            ScanPathError::NotDirectory(path) => write!(f, "Not a directory: {}", path.display()),
            ScanPathError::NotReadable(path) => {
                write!(f, "Cannot read directory: {}", path.display())
            }
        }
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(path.strip_prefix("~").unwrap_or(path));
        }
    }
    path.to_path_buf()
}

/// Anchor `path` at `base` unless it is already absolute. `.` segments are dropped.
pub fn anchor(base: &Path, path: &Path) -> PathBuf {
    let expanded = expand_home(path);
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };
    let cleaned: PathBuf = joined
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

pub fn canonicalize_scan_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

pub fn validate_scan_path(path: &Path) -> Result<(), ScanPathError> {
    if !path.exists() {
        return Err(ScanPathError::NotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(ScanPathError::NotDirectory(path.to_path_buf()));
    }
    if std::fs::read_dir(path).is_err() {
        return Err(ScanPathError::NotReadable(path.to_path_buf()));
    }
    Ok(())
}

/// Project-relative display path with forward slashes.
///
/// Falls back to the full path when `path` is outside `base`.
pub fn relative_display(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
        .replace("//", "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn validate_reports_missing_and_file_paths() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("a.txt");
        std::fs::write(&file, "x").unwrap();

        assert!(validate_scan_path(temp.path()).is_ok());
        assert_eq!(
            validate_scan_path(&temp.path().join("missing")),
            Err(ScanPathError::NotFound(temp.path().join("missing")))
        );
        assert_eq!(
            validate_scan_path(&file),
            Err(ScanPathError::NotDirectory(file.clone()))
        );
    }

    #[test]
    fn anchor_keeps_absolute_paths() {
        let base = Path::new("/project");
        assert_eq!(anchor(base, Path::new("docs")), PathBuf::from("/project/docs"));
        assert_eq!(anchor(base, Path::new("/etc")), PathBuf::from("/etc"));
        assert_eq!(anchor(base, Path::new(".")), PathBuf::from("/project"));
        assert_eq!(anchor(base, Path::new("./docs/./a")), PathBuf::from("/project/docs/a"));
        assert_eq!(anchor(Path::new("."), Path::new(".")), PathBuf::from("."));
    }

    #[test]
    fn relative_display_uses_forward_slashes() {
        let base = Path::new("/project");
        assert_eq!(
            relative_display(base, Path::new("/project/docs/readme.md")),
            "docs/readme.md"
        );
        assert_eq!(relative_display(base, Path::new("/other/x.md")), "/other/x.md");
    }
}
