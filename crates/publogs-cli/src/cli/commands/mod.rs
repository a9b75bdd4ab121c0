//! CLI command handlers. Each command is in its own file.

mod providers;
mod run;
mod select;

pub use providers::run_providers;
pub use run::run_download;
