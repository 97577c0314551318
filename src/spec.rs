//! OCI bundle spec loading.
//!
//! Only the subset of the OCI runtime config this runtime acts on is
//! modelled: the process (args, env, cwd, terminal), the root filesystem
//! and annotations. Everything else in `config.json` (mounts, linux
//! namespaces, hooks, ...) is ignored.
//!
//! ```json
//! {
//!   "ociVersion": "1.1.0",
//!   "process": {
//!     "terminal": false,
//!     "args": ["/bin/sh", "-c", "echo hello"],
//!     "env": ["PATH=/usr/bin:/bin"],
//!     "cwd": "/"
//!   },
//!   "root": { "path": "rootfs", "readonly": true },
//!   "annotations": { "runproc.host": "true" }
//! }
//! ```

use crate::constants::BUNDLE_CONFIG_FILE;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Parsed bundle `config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    /// OCI runtime spec version declared by the bundle.
    #[serde(default)]
    pub oci_version: String,
    /// Process to run.
    pub process: Process,
    /// Root filesystem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<Root>,
    /// Free-form annotations.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub annotations: HashMap<String, String>,
}

/// The process section of the spec.
///
/// This is also the message piped to the init supervisor, so it stays small
/// and self-contained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    /// Whether a terminal was requested. Recorded, not acted on.
    #[serde(default)]
    pub terminal: bool,
    /// Argument vector; `args[0]` is the executable path.
    pub args: Vec<String>,
    /// `KEY=VALUE` entries.
    #[serde(default)]
    pub env: Vec<String>,
    /// Working directory inside the (possibly chrooted) filesystem.
    #[serde(default)]
    pub cwd: String,
}

impl Process {
    /// Looks up a variable in the declared environment.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env.iter().find_map(|entry| {
            entry
                .split_once('=')
                .and_then(|(k, v)| (k == key).then_some(v))
        })
    }
}

/// The root section of the spec.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    /// Root filesystem path, absolute or relative to the bundle.
    #[serde(default)]
    pub path: String,
    /// Whether the root should be read-only. Recorded, not acted on.
    #[serde(default)]
    pub readonly: bool,
}

impl Spec {
    /// Resolves the declared root path against the bundle directory.
    ///
    /// Returns `None` when no root, or an empty root path, is declared.
    pub fn root_path(&self, bundle: &Path) -> Option<PathBuf> {
        let root = self.root.as_ref()?;
        if root.path.is_empty() {
            return None;
        }
        let path = Path::new(&root.path);
        if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            Some(bundle.join(path))
        }
    }

    /// Looks up an annotation.
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

/// Loads and validates `<bundle>/config.json`.
///
/// # Errors
///
/// Returns [`Error::InvalidSpec`] if the file cannot be read or parsed, if
/// the `process` section is missing, or if `process.args` is empty.
pub fn load_spec(bundle: &Path) -> Result<Spec> {
    let path = bundle.join(BUNDLE_CONFIG_FILE);
    let content = fs::read_to_string(&path).map_err(|e| Error::InvalidSpec {
        path: path.clone(),
        reason: format!("open spec: {}", e),
    })?;

    let spec: Spec = serde_json::from_str(&content).map_err(|e| Error::InvalidSpec {
        path: path.clone(),
        reason: format!("decode spec: {}", e),
    })?;

    if spec.process.args.is_empty() {
        return Err(Error::InvalidSpec {
            path,
            reason: "process.args must not be empty".to_string(),
        });
    }

    debug!(
        "Loaded spec from {} (ociVersion {}, {} args)",
        path.display(),
        spec.oci_version,
        spec.process.args.len()
    );
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, json: &str) {
        fs::write(dir.join(BUNDLE_CONFIG_FILE), json).unwrap();
    }

    #[test]
    fn test_load_minimal_spec() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            r#"{"ociVersion":"1.1.0","process":{"args":["/bin/true"]}}"#,
        );

        let spec = load_spec(temp.path()).unwrap();
        assert_eq!(spec.oci_version, "1.1.0");
        assert_eq!(spec.process.args, vec!["/bin/true"]);
        assert!(spec.process.env.is_empty());
        assert!(spec.root.is_none());
        assert!(spec.annotations.is_empty());
    }

    #[test]
    fn test_empty_args_rejected() {
        let temp = TempDir::new().unwrap();
        write_config(temp.path(), r#"{"process":{"args":[]}}"#);

        let err = load_spec(temp.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidSpec { .. }));
    }

    #[test]
    fn test_root_path_resolution() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            r#"{"process":{"args":["/bin/true"]},"root":{"path":"rootfs"}}"#,
        );
        let spec = load_spec(temp.path()).unwrap();
        assert_eq!(
            spec.root_path(temp.path()),
            Some(temp.path().join("rootfs"))
        );

        let mut absolute = spec.clone();
        absolute.root = Some(Root {
            path: "/srv/root".to_string(),
            readonly: false,
        });
        assert_eq!(
            absolute.root_path(temp.path()),
            Some(PathBuf::from("/srv/root"))
        );

        let mut empty = spec;
        empty.root = Some(Root::default());
        assert_eq!(empty.root_path(temp.path()), None);
    }

    #[test]
    fn test_env_var_lookup() {
        let process = Process {
            args: vec!["/bin/true".to_string()],
            env: vec!["A=1".to_string(), "NOEQUALS".to_string(), "B=x=y".to_string()],
            ..Default::default()
        };
        assert_eq!(process.env_var("A"), Some("1"));
        assert_eq!(process.env_var("B"), Some("x=y"));
        assert_eq!(process.env_var("NOEQUALS"), None);
        assert_eq!(process.env_var("C"), None);
    }
}
