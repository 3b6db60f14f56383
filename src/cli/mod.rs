pub mod output;
pub mod runtime;

pub use output::{render, OutputFormat};
pub use runtime::{init_logging, load_env_overrides};
