pub mod config;
pub mod environment;
pub mod error;

pub use config::{load_dotenv, Settings};
pub use environment::{ConfigProvider, EnvironmentProvider, HostEnvironment};
pub use error::*;
