//! Leap documents and their JSON persistence.
//!
//! A leap file is a JSON object. It is held as an insertion-ordered map so
//! that rewriting a file keeps the user's key order and any keys this
//! version does not recognize.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ConfError;

/// Key-to-value mapping of one leap.
pub type ConfData = IndexMap<String, Value>;

/// Reads a leap file. Returns `Ok(None)` when the file does not exist.
pub fn read_conf(path: &Path) -> Result<Option<ConfData>, ConfError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str::<ConfData>(&text)
        .map(Some)
        .map_err(|source| ConfError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

/// Writes a leap file atomically (temp file in the same dir, then rename).
///
/// Missing parent directories are created.
pub fn write_conf(path: &Path, data: &ConfData) -> Result<(), ConfError> {
    let write_err = |source: io::Error| ConfError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(write_err)?;

    let mut text = serde_json::to_string_pretty(data).map_err(|err| write_err(err.into()))?;
    text.push('\n');

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    temp.write_all(text.as_bytes()).map_err(write_err)?;
    temp.persist(path).map_err(|err| write_err(err.error))?;
    tracing::debug!(path = %path.display(), "wrote leap file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_conf(&dir.path().join("nope.json")).unwrap().is_none());
    }

    #[test]
    fn non_object_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(read_conf(&path), Err(ConfError::Malformed { .. })));

        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(read_conf(&path), Err(ConfError::Malformed { .. })));
    }

    #[test]
    fn rewrite_preserves_key_order_and_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/conf.json");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"{ "zeta": 1, "alpha": { "y": 2, "x": 3 }, "ref_root_dir_rel_path": "." }"#,
        )
        .unwrap();

        let mut data = read_conf(&path).unwrap().unwrap();
        data.insert(String::from("conf_client_file_rel_path"), json!("gconf/p.json"));
        write_conf(&path, &data).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let zeta = text.find("zeta").unwrap();
        let alpha = text.find("alpha").unwrap();
        let y = text.find("\"y\"").unwrap();
        let x = text.find("\"x\"").unwrap();
        assert!(zeta < alpha && y < x);
        assert_eq!(read_conf(&path).unwrap().unwrap(), data);
    }

    #[test]
    fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gconf/proto_kernel.json");
        write_conf(&path, &ConfData::new()).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");
    }
}
