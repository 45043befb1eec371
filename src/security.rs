//! Project-root path containment.
//!
//! Every path handed to the engine passes through [`SecurityValidator`] before
//! anything else happens, including cache lookup.

use std::path::{Component, Path, PathBuf};

use crate::error::{AnalysisError, Result};

/// Validates request paths against a project root.
#[derive(Debug, Clone)]
pub struct SecurityValidator {
    /// Canonical project root, if one was configured.
    root: Option<PathBuf>,
}

impl SecurityValidator {
    /// Create a validator. The root is canonicalized when it exists.
    pub fn new(root: Option<&Path>) -> Self {
        let root = root.map(|r| r.canonicalize().unwrap_or_else(|_| normalize_lexically(r)));
        Self { root }
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Validate `raw` and return the resolved path.
    ///
    /// Rejects empty paths, NUL bytes, any `..` segment, and paths that resolve
    /// outside the project root (symlinks followed).
    pub fn validate(&self, raw: &str) -> Result<PathBuf> {
        if raw.trim().is_empty() {
            return Err(AnalysisError::invalid_path(raw, "empty path"));
        }
        if raw.contains('\0') {
            return Err(AnalysisError::invalid_path(raw, "path contains a NUL byte"));
        }
        if has_traversal_token(raw) {
            return Err(AnalysisError::invalid_path(raw, "parent directory traversal"));
        }

        let candidate = Path::new(raw);
        let Some(root) = &self.root else {
            return Ok(normalize_lexically(candidate));
        };

        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            root.join(candidate)
        };
        let resolved = resolve(&joined);

        if !resolved.starts_with(root) {
            return Err(AnalysisError::invalid_path(
                raw,
                format!("resolves outside project root {}", root.display()),
            ));
        }
        Ok(resolved)
    }
}

fn has_traversal_token(raw: &str) -> bool {
    if raw == ".." || raw.starts_with("../") || raw.starts_with("..\\") {
        return true;
    }
    if raw.contains("/../") || raw.contains("\\..\\") || raw.ends_with("/..") || raw.ends_with("\\..")
    {
        return true;
    }
    Path::new(raw)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

/// Canonicalize the deepest existing ancestor, then append the rest.
fn resolve(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    let normalized = normalize_lexically(path);
    let mut existing = normalized.as_path();
    let mut tail = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }

    let mut resolved = existing
        .canonicalize()
        .unwrap_or_else(|_| existing.to_path_buf());
    for part in tail.iter().rev() {
        resolved.push(part);
    }
    resolved
}

/// Collapse `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let validator = SecurityValidator::new(Some(temp.path()));

        for raw in ["../../../etc/passwd", "src/../../x.py", "..", "a\\..\\..\\b"] {
            let err = validator.validate(raw).unwrap_err();
            assert!(
                matches!(err, AnalysisError::InvalidPath { .. }),
                "expected InvalidPath for {raw}"
            );
        }
    }

    #[test]
    fn test_rejects_traversal_without_root() {
        let validator = SecurityValidator::new(None);
        assert!(validator.validate("../../../etc/passwd").is_err());
        assert!(validator.validate("src/main.py").is_ok());
    }

    #[test]
    fn test_rejects_absolute_outside_root() {
        let temp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let outside = other.path().join("x.py");
        std::fs::write(&outside, "x = 1\n").unwrap();

        let validator = SecurityValidator::new(Some(temp.path()));
        assert!(validator.validate(outside.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_accepts_inside_root() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("src")).unwrap();
        std::fs::write(temp.path().join("src/app.py"), "x = 1\n").unwrap();

        let validator = SecurityValidator::new(Some(temp.path()));
        let resolved = validator.validate("src/app.py").unwrap();
        assert!(resolved.ends_with("src/app.py"));

        // Missing files resolve lexically under the root.
        let resolved = validator.validate("./src/new_file.py").unwrap();
        assert!(resolved.starts_with(validator.project_root().unwrap()));
    }

    #[test]
    fn test_dotted_names_allowed() {
        let temp = TempDir::new().unwrap();
        let validator = SecurityValidator::new(Some(temp.path()));
        assert!(validator.validate("archive..old.py").is_ok());
    }

    #[test]
    fn test_rejects_empty_and_nul() {
        let validator = SecurityValidator::new(None);
        assert!(validator.validate("").is_err());
        assert!(validator.validate("a\0b.py").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_rejects_symlink_escape() {
        let temp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        std::fs::write(other.path().join("secret.py"), "x = 1\n").unwrap();
        std::os::unix::fs::symlink(other.path(), temp.path().join("link")).unwrap();

        let validator = SecurityValidator::new(Some(temp.path()));
        assert!(validator.validate("link/secret.py").is_err());
    }
}
