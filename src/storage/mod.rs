//! Configuration storage module.
//!
//! Handles saving and loading the controller configuration to/from disk.

pub mod settings;

// Re-export commonly used items
pub use settings::{
    ensure_config_exists, get_config_dir, get_config_path, load_config, resolve_config,
    save_config,
};
