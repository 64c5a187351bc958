//! The closed enumeration of bootstrap state names.
//!
//! Declaration order is the enumeration order: every parent precedes its
//! children and parent lists are sorted by it. Names follow
//! `<leap>_<subject>_<action>`; they appear on the command line
//! (`--final-state`) and in graph renderings.

use protoprimer_core::StateName;

macro_rules! env_states {
    ($($variant:ident => $name:literal,)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum EnvState {
            $($variant,)+
        }

        impl EnvState {
            pub const ALL: &'static [EnvState] = &[$(EnvState::$variant,)+];
        }

        impl StateName for EnvState {
            fn as_str(&self) -> &'static str {
                match self {
                    $(EnvState::$variant => $name,)+
                }
            }

            fn ordinal(&self) -> usize {
                *self as usize
            }

            fn all() -> &'static [Self] {
                EnvState::ALL
            }
        }
    };
}

env_states! {
    InputParsedArgsLoaded => "input_parsed_args_loaded",
    InputStderrLogLevelEvalFinalized => "input_stderr_log_level_eval_finalized",
    InputStderrLogHandlerConfigured => "input_stderr_log_handler_configured",
    InputRunModeArgLoaded => "input_run_mode_arg_loaded",
    InputWizardStageArgLoaded => "input_wizard_stage_arg_loaded",
    InputStartIdVarLoaded => "input_start_id_var_loaded",
    InputPyExecVarLoaded => "input_py_exec_var_loaded",
    InputDoInstallVarLoaded => "input_do_install_var_loaded",
    InputPackageDriverVarLoaded => "input_package_driver_var_loaded",
    InputMainFuncVarLoaded => "input_main_func_var_loaded",
    InputProtoCodeFileAbsPathEvalFinalized => "input_proto_code_file_abs_path_eval_finalized",
    InputEntryScriptBasenameEvalFinalized => "input_entry_script_basename_eval_finalized",
    PrimerConfFileAbsPathEvalFinalized => "primer_conf_file_abs_path_eval_finalized",
    PrimerConfFileDataLoaded => "primer_conf_file_data_loaded",
    PrimerRefRootDirAbsPathEvalFinalized => "primer_ref_root_dir_abs_path_eval_finalized",
    PrimerConfClientFileAbsPathEvalFinalized => "primer_conf_client_file_abs_path_eval_finalized",
    ClientConfDirAbsPathEvalFinalized => "client_conf_dir_abs_path_eval_finalized",
    ClientConfFileDataLoaded => "client_conf_file_data_loaded",
    ClientLinkNameDirAbsPathEvalFinalized => "client_link_name_dir_abs_path_eval_finalized",
    ClientDefaultEnvDirAbsPathEvalFinalized => "client_default_env_dir_abs_path_eval_finalized",
    EnvLocalConfSymlinkAbsPathEvalFinalized => "env_local_conf_symlink_abs_path_eval_finalized",
    EnvConfDirAbsPathEvalFinalized => "env_conf_dir_abs_path_eval_finalized",
    EnvConfFileAbsPathEvalFinalized => "env_conf_file_abs_path_eval_finalized",
    EnvConfFileDataLoaded => "env_conf_file_data_loaded",
    EnvLocalPythonFileAbsPathEvalFinalized => "env_local_python_file_abs_path_eval_finalized",
    EnvLocalVenvDirAbsPathEvalFinalized => "env_local_venv_dir_abs_path_eval_finalized",
    EnvLocalLogDirAbsPathEvalFinalized => "env_local_log_dir_abs_path_eval_finalized",
    EnvLocalTmpDirAbsPathEvalFinalized => "env_local_tmp_dir_abs_path_eval_finalized",
    EnvLocalCacheDirAbsPathEvalFinalized => "env_local_cache_dir_abs_path_eval_finalized",
    EnvConstraintsFileAbsPathEvalFinalized => "env_constraints_file_abs_path_eval_finalized",
    EnvProjectDescriptorsEvalFinalized => "env_project_descriptors_eval_finalized",
    EnvPackageDriverKindEvalFinalized => "env_package_driver_kind_eval_finalized",
    EnvPyExecCategoryEvalFinalized => "env_py_exec_category_eval_finalized",
    EnvDoInstallEvalFinalized => "env_do_install_eval_finalized",
    StateFileLogHandlerConfigured => "state_file_log_handler_configured",
    StatePackageDriverInited => "state_package_driver_inited",
    StatePyExecArbitraryReached => "state_py_exec_arbitrary_reached",
    StateReinstallTriggered => "state_reinstall_triggered",
    StatePyExecRequiredReached => "state_py_exec_required_reached",
    StatePyExecVenvReached => "state_py_exec_venv_reached",
    StateDepsUpdated => "state_deps_updated",
    StateProtoCodeUpdated => "state_proto_code_updated",
    StateEffectiveConfigPrinted => "state_effective_config_printed",
    StateMainFuncExecuted => "state_main_func_executed",
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ordinals_follow_declaration() {
        for (index, state) in EnvState::ALL.iter().enumerate() {
            assert_eq!(state.ordinal(), index);
        }
    }

    #[test]
    fn names_are_unique_and_prefixed() {
        let mut seen = HashSet::new();
        for state in EnvState::ALL {
            let name = state.as_str();
            assert!(seen.insert(name), "duplicate {}", name);
            assert!(
                ["input_", "primer_", "client_", "env_", "state_"]
                    .iter()
                    .any(|prefix| name.starts_with(prefix)),
                "{}",
                name
            );
        }
    }

    #[test]
    fn from_name_round_trips() {
        for state in EnvState::ALL {
            assert_eq!(EnvState::from_name(state.as_str()), Some(*state));
        }
        assert_eq!(EnvState::from_name("state_unknown"), None);
    }
}
