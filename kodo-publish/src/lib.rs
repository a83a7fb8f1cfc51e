pub mod cli;
pub mod kodo;
pub mod load_config;
pub mod reporter;

pub use cli::{run, Cli, Commands};
