//! `publogs providers` – list the provider menu.

use publogs_core::config::PublogsConfig;

pub fn run_providers(cfg: &PublogsConfig) {
    if cfg.providers.is_empty() {
        println!("No providers configured. Add [[providers]] entries to the config or pass --manifest to `publogs run`.");
        return;
    }
    for (i, entry) in cfg.providers.iter().enumerate() {
        println!("  {}) {}  {}", i + 1, entry.name, entry.manifest);
    }
}
