//! Recognized configuration fields and their per-field metadata.
//!
//! Each [`ConfField`] knows its JSON key, the leaps it belongs to, how to
//! validate a stored value, how to parse wizard input and how to render a
//! value for review.

use serde_json::Value;

use crate::data::ConfData;
use crate::descriptor::{PackageDriverKind, ProjectDescriptor};
use crate::error::ConfError;
use crate::leap::ConfLeap;
use crate::paths::check_rel_path;

/// Shape of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Relative path: no root, no `..`.
    RelPath,
    /// Absolute path, or relative to ref-root.
    AnyPath,
    /// One of the package driver names.
    Driver,
    /// List of project descriptors.
    Descriptors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfField {
    RefRootDirRelPath,
    ConfClientFileRelPath,
    LinkNameDirRelPath,
    DefaultEnvDirRelPath,
    LocalPythonFileAbsPath,
    LocalVenvDirRelPath,
    LocalLogDirRelPath,
    LocalTmpDirRelPath,
    LocalCacheDirRelPath,
    PackageDriver,
    ProjectDescriptors,
}

const PRIMER: &[ConfLeap] = &[ConfLeap::Primer];
const CLIENT: &[ConfLeap] = &[ConfLeap::Client];
const ENV: &[ConfLeap] = &[ConfLeap::Env];
const CLIENT_AND_ENV: &[ConfLeap] = &[ConfLeap::Client, ConfLeap::Env];

impl ConfField {
    /// All fields in prompt order.
    pub const ALL: [ConfField; 11] = [
        ConfField::RefRootDirRelPath,
        ConfField::ConfClientFileRelPath,
        ConfField::LinkNameDirRelPath,
        ConfField::DefaultEnvDirRelPath,
        ConfField::LocalPythonFileAbsPath,
        ConfField::LocalVenvDirRelPath,
        ConfField::LocalLogDirRelPath,
        ConfField::LocalTmpDirRelPath,
        ConfField::LocalCacheDirRelPath,
        ConfField::PackageDriver,
        ConfField::ProjectDescriptors,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ConfField::RefRootDirRelPath => "ref_root_dir_rel_path",
            ConfField::ConfClientFileRelPath => "conf_client_file_rel_path",
            ConfField::LinkNameDirRelPath => "link_name_dir_rel_path",
            ConfField::DefaultEnvDirRelPath => "default_env_dir_rel_path",
            ConfField::LocalPythonFileAbsPath => "local_python_file_abs_path",
            ConfField::LocalVenvDirRelPath => "local_venv_dir_rel_path",
            ConfField::LocalLogDirRelPath => "local_log_dir_rel_path",
            ConfField::LocalTmpDirRelPath => "local_tmp_dir_rel_path",
            ConfField::LocalCacheDirRelPath => "local_cache_dir_rel_path",
            ConfField::PackageDriver => "package_driver",
            ConfField::ProjectDescriptors => "project_descriptors",
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            ConfField::LocalPythonFileAbsPath => FieldKind::AnyPath,
            ConfField::PackageDriver => FieldKind::Driver,
            ConfField::ProjectDescriptors => FieldKind::Descriptors,
            _ => FieldKind::RelPath,
        }
    }

    /// Leaps this field may appear in.
    pub fn leaps(&self) -> &'static [ConfLeap] {
        match self {
            ConfField::RefRootDirRelPath | ConfField::ConfClientFileRelPath => PRIMER,
            ConfField::LinkNameDirRelPath | ConfField::DefaultEnvDirRelPath => CLIENT,
            ConfField::LocalPythonFileAbsPath => ENV,
            ConfField::LocalVenvDirRelPath
            | ConfField::LocalLogDirRelPath
            | ConfField::LocalTmpDirRelPath
            | ConfField::LocalCacheDirRelPath
            | ConfField::PackageDriver
            | ConfField::ProjectDescriptors => CLIENT_AND_ENV,
        }
    }

    pub fn applies_to(&self, leap: ConfLeap) -> bool {
        self.leaps().contains(&leap)
    }

    /// Fields the env leap may override over the client leap.
    pub fn is_env_override(&self) -> bool {
        self.leaps() == CLIENT_AND_ENV
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConfField::RefRootDirRelPath => {
                "Path to the reference root (usually the checkout root), relative to the dir of the proto-code."
            }
            ConfField::ConfClientFileRelPath => {
                "Path to the client conf file, relative to the ref root."
            }
            ConfField::LinkNameDirRelPath => {
                "Path of the symlink selecting the env conf dir, relative to the ref root."
            }
            ConfField::DefaultEnvDirRelPath => {
                "Env conf dir the symlink points at when it is created, relative to the ref root."
            }
            ConfField::LocalPythonFileAbsPath => {
                "Base python used to create the venv (absolute, or relative to the ref root)."
            }
            ConfField::LocalVenvDirRelPath => "Venv dir, relative to the ref root.",
            ConfField::LocalLogDirRelPath => "Log dir, relative to the ref root.",
            ConfField::LocalTmpDirRelPath => "Tmp dir, relative to the ref root.",
            ConfField::LocalCacheDirRelPath => "Cache dir, relative to the ref root.",
            ConfField::PackageDriver => "Package driver used to manage the venv: `uv` or `pip`.",
            ConfField::ProjectDescriptors => {
                "Projects installed in editable mode: `build_root_dir_rel_path` and `install_extras`."
            }
        }
    }

    /// Validates a stored (non-null) value.
    pub fn validate(&self, value: &Value) -> Result<(), ConfError> {
        match self.kind() {
            FieldKind::RelPath => {
                check_rel_path(self.key(), self.expect_str(value)?)?;
            }
            FieldKind::AnyPath => {
                if self.expect_str(value)?.is_empty() {
                    return Err(self.invalid("", "must not be empty"));
                }
            }
            FieldKind::Driver => {
                let raw = self.expect_str(value)?;
                raw.parse::<PackageDriverKind>()
                    .map_err(|reason| self.invalid(raw, &reason))?;
            }
            FieldKind::Descriptors => {
                for descriptor in self.descriptors(value)? {
                    check_rel_path("build_root_dir_rel_path", &descriptor.build_root_dir_rel_path)?;
                }
            }
        }
        Ok(())
    }

    /// Parses one line of wizard input into a value.
    ///
    /// The error is the reason shown to the user before prompting again.
    pub fn parse_input(&self, input: &str) -> Result<Value, String> {
        let value = Value::String(input.to_string());
        match self.kind() {
            FieldKind::Descriptors => serde_json::from_str::<Value>(input)
                .map_err(|err| err.to_string())
                .and_then(|parsed| {
                    self.validate(&parsed).map_err(|err| err.to_string())?;
                    Ok(parsed)
                }),
            _ => {
                self.validate(&value).map_err(|err| err.to_string())?;
                Ok(value)
            }
        }
    }

    /// Renders a value for review.
    pub fn review(&self, value: Option<&Value>) -> String {
        match value {
            None | Some(Value::Null) => String::from("[None]"),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// A reason the wizard must not edit this field in `data`, if any.
    ///
    /// Descriptor lists are structured data and are left to manual edits.
    pub fn not_wizardable(&self, data: &ConfData) -> Option<String> {
        match self.kind() {
            FieldKind::Descriptors => {
                let count = data
                    .get(self.key())
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                Some(format!(
                    "`{}` holds {} entries; edit the file directly",
                    self.key(),
                    count
                ))
            }
            _ => None,
        }
    }

    /// Reads the field as a string, `None` when absent or null.
    pub fn read_str<'a>(&self, data: &'a ConfData) -> Result<Option<&'a str>, ConfError> {
        match data.get(self.key()) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.expect_str(value).map(Some),
        }
    }

    /// Reads the field as a list of project descriptors.
    pub fn read_descriptors(
        &self,
        data: &ConfData,
    ) -> Result<Option<Vec<ProjectDescriptor>>, ConfError> {
        match data.get(self.key()) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => self.descriptors(value).map(Some),
        }
    }

    fn expect_str<'a>(&self, value: &'a Value) -> Result<&'a str, ConfError> {
        value.as_str().ok_or(ConfError::FieldType {
            field: self.key(),
            expected: "a string",
        })
    }

    fn descriptors(&self, value: &Value) -> Result<Vec<ProjectDescriptor>, ConfError> {
        serde_json::from_value(value.clone()).map_err(|_| ConfError::FieldType {
            field: self.key(),
            expected: "a list of {build_root_dir_rel_path, install_extras} objects",
        })
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfError {
        ConfError::FieldValue {
            field: self.key(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn every_field_belongs_to_a_file_backed_leap() {
        for field in ConfField::ALL {
            assert!(!field.leaps().is_empty());
            assert!(!field.applies_to(ConfLeap::Input), "{}", field.key());
        }
    }

    #[test]
    fn env_overrides_match_client_fields() {
        let overrides: Vec<&str> = ConfField::ALL
            .iter()
            .filter(|f| f.is_env_override())
            .map(|f| f.key())
            .collect();
        assert_eq!(
            overrides,
            vec![
                "local_venv_dir_rel_path",
                "local_log_dir_rel_path",
                "local_tmp_dir_rel_path",
                "local_cache_dir_rel_path",
                "package_driver",
                "project_descriptors",
            ]
        );
    }

    #[test]
    fn driver_values_are_checked() {
        assert!(ConfField::PackageDriver.validate(&json!("uv")).is_ok());
        assert!(ConfField::PackageDriver.validate(&json!("pip")).is_ok());
        assert!(matches!(
            ConfField::PackageDriver.validate(&json!("conda")),
            Err(ConfError::FieldValue { .. })
        ));
        assert!(matches!(
            ConfField::PackageDriver.validate(&json!(3)),
            Err(ConfError::FieldType { .. })
        ));
    }

    #[test]
    fn descriptors_validate_build_root_hygiene() {
        let ok = json!([{ "build_root_dir_rel_path": "src/app", "install_extras": ["test"] }]);
        assert!(ConfField::ProjectDescriptors.validate(&ok).is_ok());

        let bad = json!([{ "build_root_dir_rel_path": "../outside" }]);
        assert!(matches!(
            ConfField::ProjectDescriptors.validate(&bad),
            Err(ConfError::PathHygiene { .. })
        ));
    }

    #[test]
    fn python_path_may_be_relative() {
        assert!(ConfField::LocalPythonFileAbsPath.validate(&json!("py/bin/python3")).is_ok());
        assert!(ConfField::LocalPythonFileAbsPath.validate(&json!("/usr/bin/python3")).is_ok());
    }

    #[test]
    fn parse_input_reports_reason() {
        let reason = ConfField::LocalVenvDirRelPath.parse_input("/venv").unwrap_err();
        assert!(reason.contains("must be relative"), "{}", reason);
        assert_eq!(
            ConfField::LocalVenvDirRelPath.parse_input("venv2").unwrap(),
            json!("venv2")
        );
    }

    #[test]
    fn review_renders_none_and_strings() {
        assert_eq!(ConfField::PackageDriver.review(None), "[None]");
        assert_eq!(ConfField::PackageDriver.review(Some(&json!("uv"))), "uv");
    }
}
