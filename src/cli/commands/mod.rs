//! CLI command implementations

pub mod config;
pub mod list;
pub mod resolve;
pub mod upload;

pub use config::execute as config;
pub use list::execute as list;
pub use resolve::execute as resolve;
pub use upload::execute as upload;
