#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;
pub mod plan;
pub mod process;
pub mod vfs;

pub use error::{CliError, ConfigError, RunError};
pub use executor::{ErrorCode, ExecutorError};
pub use plan::{PlanError, SpecError};
pub use process::ProcessError;
pub use vfs::VfsError;
