//! Configuration leaps and their file conventions.
//!
//! A [`LeapSpec`] bundles what it takes to load one file-backed leap: whether
//! the file must exist, the defaults merged into it and the validation of its
//! recognized fields. The three file-backed leaps are three instances,
//! loaded strictly in order so each can use values resolved by the previous.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::data::{read_conf, ConfData};
use crate::error::ConfError;
use crate::field::ConfField;

/// Directory under ref-root holding the client leap file.
pub const GLOBAL_CONF_DIR_REL_PATH: &str = "gconf";
/// Default name of the symlink selecting the env dir.
pub const DEFAULT_LINK_NAME_DIR_REL_PATH: &str = "lconf";
/// Default env dir the symlink points at when first created.
pub const DEFAULT_ENV_DIR_REL_PATH: &str = "default_env";
pub const DEFAULT_VENV_DIR_REL_PATH: &str = "venv";
pub const DEFAULT_LOG_DIR_REL_PATH: &str = "log";
pub const DEFAULT_TMP_DIR_REL_PATH: &str = "tmp";
pub const DEFAULT_CACHE_DIR_REL_PATH: &str = "cache";
/// Frozen dependency pins, written into the env conf dir.
pub const CONSTRAINTS_FILE_BASENAME: &str = "constraints.txt";

/// The four ordered configuration leaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfLeap {
    Input,
    Primer,
    Client,
    Env,
}

impl ConfLeap {
    pub const ALL: [ConfLeap; 4] = [
        ConfLeap::Input,
        ConfLeap::Primer,
        ConfLeap::Client,
        ConfLeap::Env,
    ];

    /// Leaps persisted as JSON files.
    pub const FILE_BACKED: [ConfLeap; 3] = [ConfLeap::Primer, ConfLeap::Client, ConfLeap::Env];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfLeap::Input => "input",
            ConfLeap::Primer => "primer",
            ConfLeap::Client => "client",
            ConfLeap::Env => "env",
        }
    }

    /// Fields recognized in this leap, in prompt order.
    pub fn fields(&self) -> Vec<ConfField> {
        ConfField::ALL
            .iter()
            .copied()
            .filter(|field| field.applies_to(*self))
            .collect()
    }

    /// Keys of `data` that this leap does not recognize.
    pub fn unused_keys<'a>(&self, data: &'a ConfData) -> Vec<&'a str> {
        let known = self.fields();
        data.keys()
            .map(String::as_str)
            .filter(|key| !known.iter().any(|field| field.key() == *key))
            .collect()
    }
}

impl fmt::Display for ConfLeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Basename shared by every leap file: the proto-code basename with its
/// extension replaced by `.json`.
pub fn conf_file_basename(proto_code: &Path) -> String {
    let stem = proto_code
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("protoprimer"));
    format!("{}.json", stem)
}

/// Primer leap file: next to the proto-code, same stem, `.json` extension.
pub fn primer_conf_file_path(proto_code: &Path) -> PathBuf {
    proto_code.with_extension("json")
}

/// How to load one file-backed leap.
#[derive(Debug, Clone)]
pub struct LeapSpec {
    pub leap: ConfLeap,
    /// Fail with [`ConfError::Missing`] when the file is absent.
    pub required: bool,
    /// Values filling absent (or null) keys.
    pub defaults: ConfData,
}

impl LeapSpec {
    /// Primer leap. `conf_basename` is the shared leap file basename.
    pub fn primer(conf_basename: &str, required: bool) -> Self {
        let mut defaults = ConfData::new();
        defaults.insert(
            ConfField::ConfClientFileRelPath.key().to_string(),
            Value::String(format!("{}/{}", GLOBAL_CONF_DIR_REL_PATH, conf_basename)),
        );
        LeapSpec {
            leap: ConfLeap::Primer,
            required,
            defaults,
        }
    }

    pub fn client() -> Self {
        let mut defaults = ConfData::new();
        for (field, value) in [
            (ConfField::LinkNameDirRelPath, DEFAULT_LINK_NAME_DIR_REL_PATH),
            (ConfField::DefaultEnvDirRelPath, DEFAULT_ENV_DIR_REL_PATH),
            (ConfField::LocalVenvDirRelPath, DEFAULT_VENV_DIR_REL_PATH),
            (ConfField::LocalLogDirRelPath, DEFAULT_LOG_DIR_REL_PATH),
            (ConfField::LocalTmpDirRelPath, DEFAULT_TMP_DIR_REL_PATH),
            (ConfField::LocalCacheDirRelPath, DEFAULT_CACHE_DIR_REL_PATH),
        ] {
            defaults.insert(field.key().to_string(), Value::String(value.to_string()));
        }
        LeapSpec {
            leap: ConfLeap::Client,
            required: false,
            defaults,
        }
    }

    /// Env leap. No defaults: absent override fields fall back to the client leap.
    pub fn env() -> Self {
        LeapSpec {
            leap: ConfLeap::Env,
            required: false,
            defaults: ConfData::new(),
        }
    }

    /// Loads `path`, merges defaults and validates recognized fields.
    pub fn load(&self, path: &Path) -> Result<ConfData, ConfError> {
        let merged = self.load_unvalidated(path)?;
        self.validate(&merged)?;
        Ok(merged)
    }

    /// Loads `path` and merges defaults. Field values are not checked, so
    /// the wizard can show and replace invalid ones.
    pub fn load_unvalidated(&self, path: &Path) -> Result<ConfData, ConfError> {
        let data = match read_conf(path)? {
            Some(data) => {
                tracing::debug!(leap = %self.leap, path = %path.display(), "loaded leap file");
                data
            }
            None if self.required => {
                return Err(ConfError::Missing {
                    path: path.to_path_buf(),
                })
            }
            None => {
                tracing::debug!(leap = %self.leap, path = %path.display(), "leap file absent, using defaults");
                ConfData::new()
            }
        };
        Ok(self.merge_defaults(data))
    }

    /// Fills absent or null keys from the defaults; present values win.
    pub fn merge_defaults(&self, mut data: ConfData) -> ConfData {
        for (key, value) in &self.defaults {
            let absent = data.get(key).map_or(true, Value::is_null);
            if absent {
                data.insert(key.clone(), value.clone());
            }
        }
        data
    }

    /// Validates every recognized, non-null field of this leap.
    pub fn validate(&self, data: &ConfData) -> Result<(), ConfError> {
        for field in self.leap.fields() {
            if let Some(value) = data.get(field.key()) {
                if !value.is_null() {
                    field.validate(value)?;
                }
            }
        }
        Ok(())
    }
}
