pub mod config_manager;
pub mod error;
pub mod query_builder;
pub mod sanitize;
pub mod types;

pub use config_manager::*;
pub use error::*;
pub use query_builder::*;
pub use sanitize::*;
pub use types::*;
