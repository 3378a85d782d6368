pub mod cli;
pub mod load_config;
pub mod pipeline;

pub use cli::{run, Cli, Commands};
