pub mod codec;
pub mod config;
pub mod entity;
pub mod error;

pub use config::Config;
pub use entity::*;
pub use error::*;
