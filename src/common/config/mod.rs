mod loader;
mod runtime_config;
pub mod sections;
pub mod utils;
pub mod validation;

pub use loader::{ConfigLoader, DEFAULT_CONFIG_PATH, ENV_PREFIX};
pub use runtime_config::RuntimeConfig;
pub use sections::*;
pub use utils::ConfigUtils;
pub use validation::ConfigSection;
