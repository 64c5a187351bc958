//! Path hygiene and derivation helpers.
//!
//! Every `*_rel_path` field is anchored at some base directory (usually
//! ref-root) and must stay below it: it may not be absolute and may not
//! contain `..`.

use std::path::{Component, Path, PathBuf};

use serde_json::Value;

use crate::data::ConfData;
use crate::error::ConfError;
use crate::field::ConfField;

/// Checks that `value` is a clean relative path.
pub fn check_rel_path<'a>(field: &'static str, value: &'a str) -> Result<&'a Path, ConfError> {
    let hygiene = |reason| ConfError::PathHygiene {
        field,
        path: value.to_string(),
        reason,
    };
    if value.is_empty() {
        return Err(hygiene("must not be empty"));
    }
    let path = Path::new(value);
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => return Err(hygiene("must be relative")),
            Component::ParentDir => return Err(hygiene("must not contain `..`")),
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(path)
}

/// Joins `rel` onto `base`, dropping `.` components.
pub fn join_clean(base: &Path, rel: &Path) -> PathBuf {
    base.join(rel)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Resolves a path field that may be absolute or relative to `base`.
pub fn resolve_any(base: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        join_clean(base, path)
    }
}

/// Resolves a field the env leap may override.
///
/// The env value wins when present and non-null, then the client value.
/// `None` means the caller applies its hard-coded default.
pub fn resolve_override<'a>(
    env: &'a ConfData,
    client: &'a ConfData,
    field: ConfField,
) -> Option<&'a Value> {
    [env, client]
        .into_iter()
        .filter_map(|data| data.get(field.key()))
        .find(|value| !value.is_null())
}

/// Target for a symlink at `link_rel` pointing at `target_rel`, both relative
/// to the same base. The result is relative to the symlink's own directory.
pub fn relative_link_target(link_rel: &Path, target_rel: &Path) -> PathBuf {
    let depth = link_rel
        .parent()
        .map(|parent| {
            parent
                .components()
                .filter(|c| matches!(c, Component::Normal(_)))
                .count()
        })
        .unwrap_or(0);
    let mut target = PathBuf::new();
    for _ in 0..depth {
        target.push("..");
    }
    join_clean(&target, target_rel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn accepts_plain_relative_paths() {
        assert!(check_rel_path("f", ".").is_ok());
        assert!(check_rel_path("f", "a/b/c").is_ok());
        assert!(check_rel_path("f", "./venv").is_ok());
    }

    #[test]
    fn rejects_absolute_and_parent() {
        assert!(matches!(
            check_rel_path("f", "/abs"),
            Err(ConfError::PathHygiene { reason: "must be relative", .. })
        ));
        assert!(matches!(
            check_rel_path("f", "a/../b"),
            Err(ConfError::PathHygiene { reason: "must not contain `..`", .. })
        ));
        assert!(check_rel_path("f", "").is_err());
    }

    #[test]
    fn join_clean_drops_cur_dir() {
        assert_eq!(join_clean(Path::new("/r"), Path::new(".")), PathBuf::from("/r"));
        assert_eq!(join_clean(Path::new("/r"), Path::new("./a/./b")), PathBuf::from("/r/a/b"));
    }

    #[test]
    fn resolve_any_keeps_absolute() {
        assert_eq!(resolve_any(Path::new("/r"), "/usr/bin/python3"), PathBuf::from("/usr/bin/python3"));
        assert_eq!(resolve_any(Path::new("/r"), "py/bin/python"), PathBuf::from("/r/py/bin/python"));
    }

    #[test]
    fn env_override_wins_over_client() {
        let env: ConfData = serde_json::from_value(json!({ "local_venv_dir_rel_path": "venv_env" })).unwrap();
        let client: ConfData = serde_json::from_value(json!({
            "local_venv_dir_rel_path": "venv_client",
            "local_log_dir_rel_path": "log_client",
        }))
        .unwrap();
        let null_env: ConfData = serde_json::from_value(json!({ "local_log_dir_rel_path": null })).unwrap();

        assert_eq!(
            resolve_override(&env, &client, ConfField::LocalVenvDirRelPath),
            Some(&json!("venv_env"))
        );
        assert_eq!(
            resolve_override(&null_env, &client, ConfField::LocalLogDirRelPath),
            Some(&json!("log_client"))
        );
        assert_eq!(resolve_override(&env, &client, ConfField::LocalTmpDirRelPath), None);
    }

    #[test]
    fn link_target_climbs_to_base() {
        assert_eq!(
            relative_link_target(Path::new("lconf"), Path::new("default_env")),
            PathBuf::from("default_env")
        );
        assert_eq!(
            relative_link_target(Path::new("conf/links/lconf"), Path::new("envs/special")),
            PathBuf::from("../../envs/special")
        );
    }

    proptest! {
        #[test]
        fn rooted_paths_are_rejected(tail in "[a-z]{1,8}(/[a-z]{1,8}){0,3}") {
            let absolute = format!("/{}", tail);
            prop_assert!(check_rel_path("f", &absolute).is_err());
            prop_assert!(check_rel_path("f", &tail).is_ok());
        }

        #[test]
        fn parent_components_are_rejected(
            head in "[a-z]{1,8}",
            tail in "[a-z]{1,8}",
        ) {
            let sneaky = format!("{}/../{}", head, tail);
            prop_assert!(check_rel_path("f", &sneaky).is_err());
            let leading = format!("../{}", tail);
            prop_assert!(check_rel_path("f", &leading).is_err());
        }
    }
}
