//! Configuration for the Claude session monitor.
//!
//! All tunables live in one explicit [`Config`](schema::Config) structure
//! loaded from TOML; each component receives its own section at
//! construction time. There are no ambient globals.

pub mod default;
pub mod error;
pub mod loader;
pub mod schema;
pub mod xdg;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::Config;
