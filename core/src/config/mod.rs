//! `morph.toml` loading and conversion into registry values.

mod convert;
mod load;
mod types;

pub use convert::{
    enablement_from_config, output_root, parse_duration, register_from_config,
    registry_from_config, target_from_config, task_from_config, toolchain_from_config,
    workflow_from_config, workflows_from_config,
};
pub use load::{
    apply_env_overrides, get_morph_data_dir, load, load_default, load_from, parse_config,
    CONFIG_FILE, ENV_LOG_LEVEL, ENV_MAX_PARALLEL, ENV_OUTPUT_ROOT,
};
pub use types::{
    AcquireSection, AppConfig, AutoEnableConfig, LoggingConfig, OutputConfig, RunConfig,
    TargetConfig, TaskConfig, ToolchainConfig, WorkflowConfig,
};
