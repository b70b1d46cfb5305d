// CLI command handlers
use anyhow::{Context, Result};
use spvremap_core::{Module, RemapConfig, RemapStats, Remapper};
use std::fs;
use std::path::{Path, PathBuf};

pub fn load_config(path: &Path) -> Result<RemapConfig> {
    RemapConfig::load(path)
        .with_context(|| format!("Failed to load config: {}", path.display()))
}

/// Remap one module file and write the result under `output_dir` with the same name.
pub fn remap_file(input: &Path, output_dir: &Path, config: &RemapConfig) -> Result<RemapStats> {
    let data = fs::read(input)
        .with_context(|| format!("Failed to read SPIR-V module: {}", input.display()))?;

    let module = Module::from_bytes(&data)
        .with_context(|| format!("Failed to load SPIR-V module: {}", input.display()))?;

    let mut remapper = Remapper::new(module).with_config(config);
    let stats = remapper
        .remap()
        .with_context(|| format!("Failed to remap {}", input.display()))?;

    let output: PathBuf = output_dir.join(
        input
            .file_name()
            .with_context(|| format!("Input has no file name: {}", input.display()))?,
    );
    fs::write(&output, remapper.module().to_bytes())
        .with_context(|| format!("Failed to write {}", output.display()))?;

    log::info!(
        "{} -> {}: {} -> {} words, bound {} -> {}",
        input.display(),
        output.display(),
        stats.input_words,
        stats.output_words,
        stats.input_bound,
        stats.output_bound
    );

    Ok(stats)
}
