//! Persistent template layouts.
//!
//! A layout file maps template names (file stems) to the four screen
//! corners found for that template, so detection runs once per template
//! rather than once per render:
//!
//! ```json
//! {
//!   "phone": [[100.0, 50.0], [900.0, 60.0], [910.0, 1950.0], [90.0, 1940.0]]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use mockup_pipeline::QuadCorners;
use serde::{Deserialize, Serialize};

use crate::error::IoError;

/// Template name -> screen corners, ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutStore {
    entries: BTreeMap<String, QuadCorners>,
}

impl LayoutStore {
    /// Load a layout file. A missing file is an empty layout.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Read`] if the file exists but cannot be read and
    /// [`IoError::Layout`] if it is not valid layout JSON.
    pub fn load(path: &Path) -> Result<Self, IoError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(IoError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        serde_json::from_str(&text).map_err(|source| IoError::Layout {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a layout file, starting fresh (with a warning) if it cannot be
    /// read or parsed.
    #[must_use]
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(store) => {
                tracing::debug!(path = %path.display(), entries = store.len(), "loaded layout");
                store
            }
            Err(e) => {
                tracing::warn!("{e}; starting with an empty layout");
                Self::default()
            }
        }
    }

    /// Write the layout as pretty JSON, replacing `path` atomically.
    ///
    /// The JSON goes to a temporary file in the destination directory
    /// which is then renamed over `path`, so readers never observe a
    /// partial file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Write`] if the temporary file cannot be created,
    /// written or renamed.
    pub fn save(&self, path: &Path) -> Result<(), IoError> {
        let write_err = |source| IoError::Write {
            path: path.to_path_buf(),
            source,
        };
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(write_err)?;

        let json = serde_json::to_string_pretty(self).map_err(|e| write_err(e.into()))?;
        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.write_all(b"\n").map_err(write_err)?;
        file.persist(path).map_err(|e| write_err(e.error))?;
        Ok(())
    }

    /// Corners recorded for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&QuadCorners> {
        self.entries.get(name)
    }

    /// Record corners for `name`, returning the previous entry.
    pub fn insert(&mut self, name: impl Into<String>, corners: QuadCorners) -> Option<QuadCorners> {
        self.entries.insert(name.into(), corners)
    }

    /// Add or overwrite every entry in `other`.
    pub fn merge(&mut self, other: impl IntoIterator<Item = (String, QuadCorners)>) {
        self.entries.extend(other);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &QuadCorners)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mockup_pipeline::Point;

    use super::*;

    fn quad(offset: f64) -> QuadCorners {
        QuadCorners::new([
            Point::new(100.0 + offset, 50.0),
            Point::new(900.0 + offset, 60.0),
            Point::new(910.0 + offset, 1950.0),
            Point::new(90.0 + offset, 1940.0),
        ])
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::load(&dir.path().join("layout.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn reads_layout_written_by_hand() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        fs::write(
            &path,
            r#"{"phone": [[100, 50], [900, 60], [910, 1950], [90, 1940]]}"#,
        )
        .unwrap();
        let store = LayoutStore::load(&path).unwrap();
        assert_eq!(store.get("phone"), Some(&quad(0.0)));
        assert_eq!(store.get("tablet"), None);
    }

    #[test]
    fn save_then_load_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub/layout.json");
        let mut store = LayoutStore::default();
        store.insert("b-phone", quad(1.5));
        store.insert("a-phone", quad(0.0));
        store.save(&path).unwrap();

        let loaded = LayoutStore::load(&path).unwrap();
        assert_eq!(loaded, store);
        let names: Vec<_> = loaded.iter().map(|(name, _)| name).collect();
        assert_eq!(names, ["a-phone", "b-phone"]);
    }

    #[test]
    fn save_overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        fs::write(&path, "stale").unwrap();
        let mut store = LayoutStore::default();
        store.insert("phone", quad(0.0));
        store.save(&path).unwrap();
        assert_eq!(LayoutStore::load(&path).unwrap(), store);
    }

    #[test]
    fn corrupt_file_is_layout_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            LayoutStore::load(&path),
            Err(IoError::Layout { .. })
        ));
        assert!(LayoutStore::load_or_empty(&path).is_empty());
    }

    #[test]
    fn wrong_shape_is_layout_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        fs::write(&path, r#"{"phone": [[1, 2], [3, 4]]}"#).unwrap();
        assert!(matches!(
            LayoutStore::load(&path),
            Err(IoError::Layout { .. })
        ));
    }

    #[test]
    fn merge_overwrites_and_adds() {
        let mut store = LayoutStore::default();
        store.insert("phone", quad(0.0));
        store.merge([
            ("phone".to_string(), quad(5.0)),
            ("tablet".to_string(), quad(1.0)),
        ]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get("phone"), Some(&quad(5.0)));
        assert_eq!(store.insert("tablet", quad(2.0)), Some(quad(1.0)));
    }
}
