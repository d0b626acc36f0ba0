pub mod cli;
pub mod credentials;
pub mod load_config;
pub mod logging;
pub mod sftp;

pub use cli::{exit_code, run, Cli, Commands};
