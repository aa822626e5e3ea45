//! Model CLI subcommands: catalog validate/list, probe, load.
//!
//! Exit codes: 0 on success, 1 on failure.

use std::io::Read;
use std::path::Path;

use crate::config;
use crate::engine::signature::{self, SignatureCheck, MIN_MODEL_BYTES};
use crate::models::{ModelCatalog, ModelDescriptor};
use crate::{Bindings, Runtime, RuntimeConfig};

/// Parse and validate a catalog file.
pub fn run_validate(path: &Path) -> i32 {
    match ModelCatalog::from_file(path) {
        Ok(catalog) => {
            println!("Catalog is valid: {} model(s).", catalog.len());
            0
        }
        Err(e) => {
            eprintln!("Invalid catalog {}: {}", path.display(), e);
            1
        }
    }
}

/// Print the models in a catalog.
pub fn run_list(path: &Path) -> i32 {
    match ModelCatalog::from_file(path) {
        Ok(catalog) => {
            print_models(catalog.iter());
            0
        }
        Err(e) => {
            eprintln!("Invalid catalog {}: {}", path.display(), e);
            1
        }
    }
}

/// Report the format signature of a model file.
pub fn run_probe(path: &Path) -> i32 {
    let header = match read_header(path) {
        Ok(header) => header,
        Err(e) => {
            eprintln!("Cannot read {}: {}", path.display(), e);
            return 1;
        }
    };
    match signature::inspect(&header, &[signature::GGUF, signature::TFLITE]) {
        Ok(SignatureCheck::Recognized(format)) => {
            println!("{}: {}", path.display(), format);
            0
        }
        Ok(SignatureCheck::Unrecognized(raw)) => {
            println!(
                "{}: unrecognized signature {:?} (loading would still be attempted)",
                path.display(),
                String::from_utf8_lossy(&raw)
            );
            0
        }
        Err(short) => {
            eprintln!(
                "{}: too small ({} bytes, need at least {})",
                path.display(),
                short.size,
                MIN_MODEL_BYTES
            );
            1
        }
    }
}

/// Load one catalog entry through the registry, report, then unload.
pub async fn run_load(catalog_path: &Path, model_id: &str) -> i32 {
    let catalog = match ModelCatalog::from_file(catalog_path) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Invalid catalog {}: {}", catalog_path.display(), e);
            return 1;
        }
    };
    let Some(descriptor) = catalog.get(model_id) else {
        eprintln!("Model '{}' is not in {}", model_id, catalog_path.display());
        return 1;
    };

    let env = config::load();
    let runtime = match Runtime::new(RuntimeConfig::from(&env), Bindings::compiled()) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create runtime: {}", e);
            return 1;
        }
    };

    let code = match runtime.registry.load_model(descriptor).await {
        Ok(()) => {
            for status in runtime.registry.status() {
                println!(
                    "{:<18} {:<12} {}",
                    status.kind.as_str(),
                    status.state.to_string(),
                    status.model_id.as_deref().unwrap_or("-")
                );
            }
            0
        }
        Err(e) => {
            eprintln!("Load failed ({:?}): {}", e.category(), e);
            1
        }
    };

    if let Err(e) = runtime.shutdown().await {
        eprintln!("Shutdown failed: {}", e);
        return 1;
    }
    code
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(MIN_MODEL_BYTES);
    std::fs::File::open(path)?
        .take(MIN_MODEL_BYTES as u64)
        .read_to_end(&mut header)?;
    Ok(header)
}

/// Format and print descriptors to stdout.
pub fn print_models<'a>(models: impl Iterator<Item = &'a ModelDescriptor>) {
    println!("{:<24} {:<18} {:<8} {}", "ID", "ENGINE", "BUNDLED", "FILE");
    println!("{}", "-".repeat(72));
    let mut count = 0;
    for m in models {
        println!(
            "{:<24} {:<18} {:<8} {}",
            truncate(&m.id, 23),
            m.engine_kind.as_str(),
            if m.is_bundled() { "yes" } else { "no" },
            m.file_name
        );
        count += 1;
    }
    println!("{}", "-".repeat(72));
    println!("{} model(s)", count);
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
