//! Project descriptors and the package driver selector.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::paths::join_clean;

/// One project installed in editable mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDescriptor {
    /// Directory holding the project's build file, relative to ref-root.
    pub build_root_dir_rel_path: String,
    /// Extras installed along with the project.
    #[serde(default)]
    pub install_extras: Vec<String>,
}

impl ProjectDescriptor {
    /// Install target: `<ref_root>/<build_root>[extra,...]`.
    pub fn editable_target(&self, ref_root: &Path) -> String {
        let root = join_clean(ref_root, Path::new(&self.build_root_dir_rel_path));
        if self.install_extras.is_empty() {
            root.display().to_string()
        } else {
            format!("{}[{}]", root.display(), self.install_extras.join(","))
        }
    }
}

/// Which package manager drives venv creation and installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageDriverKind {
    Pip,
    Uv,
}

impl PackageDriverKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageDriverKind::Pip => "pip",
            PackageDriverKind::Uv => "uv",
        }
    }
}

impl fmt::Display for PackageDriverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageDriverKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pip" => Ok(PackageDriverKind::Pip),
            "uv" => Ok(PackageDriverKind::Uv),
            other => Err(format!("unknown package driver '{}', expected pip or uv", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn editable_target_with_extras() {
        let descriptor = ProjectDescriptor {
            build_root_dir_rel_path: String::from("src/app"),
            install_extras: vec![String::from("test"), String::from("docs")],
        };
        assert_eq!(descriptor.editable_target(Path::new("/r")), "/r/src/app[test,docs]");
    }

    #[test]
    fn editable_target_without_extras() {
        let descriptor: ProjectDescriptor =
            serde_json::from_str(r#"{ "build_root_dir_rel_path": "." }"#).unwrap();
        assert!(descriptor.install_extras.is_empty());
        assert_eq!(descriptor.editable_target(Path::new("/r")), "/r");
    }

    #[test]
    fn driver_kind_parses() {
        assert_eq!("uv".parse::<PackageDriverKind>(), Ok(PackageDriverKind::Uv));
        assert!("poetry".parse::<PackageDriverKind>().is_err());
        assert_eq!(PackageDriverKind::Pip.to_string(), "pip");
    }
}
