//! Configuration module

pub mod cli;
pub mod settings;

pub use cli::{CliArgs, Command, SecurityArg};
pub use settings::{Settings, Timeouts};
