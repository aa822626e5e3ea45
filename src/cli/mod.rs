//! CLI subcommands for `ondevice-cli`.
//!
//! Every command works offline against local files and environment
//! variables; nothing needs a running host application.
//!
//! ## Usage
//!
//! ```bash
//! ondevice-cli config show                 # Effective ONDEVICE_* values
//! ondevice-cli catalog validate models.toml
//! ondevice-cli probe model.tflite          # Signature sniff
//! ondevice-cli load models.toml qwen-0.5b  # Load then unload
//! ```

pub mod config_cmd;
pub mod models_cmd;
