pub mod factory;
pub mod process;
pub mod renderers;
pub mod vfs;
