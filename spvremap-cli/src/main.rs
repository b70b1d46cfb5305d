// CLI application
use anyhow::Context;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use spvremap_core::{RemapConfig, RemapOptions};
use std::path::PathBuf;

mod commands;

use commands::{load_config, remap_file};

#[derive(Parser)]
#[command(name = "spirv-remap")]
#[command(about = "SPIR-V id remapper: strips, dead-code-eliminates and canonicalizes ids")]
#[command(version)]
struct Cli {
    /// Input SPIR-V modules
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory; each module keeps its file name
    #[arg(short, long)]
    output: PathBuf,

    /// Id canonicalization strategies
    #[arg(long, value_enum, value_delimiter = ',')]
    map: Vec<MapKind>,

    /// Dead code elimination passes
    #[arg(long, value_enum, value_delimiter = ',')]
    dce: Vec<DceKind>,

    /// Load-store optimizations
    #[arg(long, value_enum, value_delimiter = ',')]
    opt: Vec<OptKind>,

    /// Strip debug information
    #[arg(short, long)]
    strip: bool,

    /// Strip, eliminate dead code and canonicalize everything
    #[arg(long)]
    do_everything: bool,

    /// JSON config file with options, verbosity and hash parameters
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print run statistics as JSON
    #[arg(long)]
    stats: bool,

    /// Increase verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
enum MapKind {
    All,
    Types,
    Names,
    Funcs,
}

#[derive(Clone, Copy, ValueEnum)]
enum DceKind {
    All,
    Funcs,
    Vars,
    Types,
}

#[derive(Clone, Copy, ValueEnum)]
enum OptKind {
    All,
    Loadstore,
    /// Non-conforming interface load/store forwarding
    Fwd,
}

impl Cli {
    /// Options selected on the command line, if any flag was given.
    fn flag_options(&self) -> Option<RemapOptions> {
        let mut options = RemapOptions::empty();

        for kind in &self.map {
            options |= match kind {
                MapKind::All => RemapOptions::MAP_ALL,
                MapKind::Types => RemapOptions::MAP_TYPES,
                MapKind::Names => RemapOptions::MAP_NAMES,
                MapKind::Funcs => RemapOptions::MAP_FUNCS,
            };
        }
        for kind in &self.dce {
            options |= match kind {
                DceKind::All => RemapOptions::DCE_ALL,
                DceKind::Funcs => RemapOptions::DCE_FUNCS,
                DceKind::Vars => RemapOptions::DCE_VARS,
                DceKind::Types => RemapOptions::DCE_TYPES,
            };
        }
        for kind in &self.opt {
            options |= match kind {
                OptKind::All => RemapOptions::OPT_ALL,
                OptKind::Loadstore => RemapOptions::OPT_LOADSTORE,
                OptKind::Fwd => RemapOptions::OPT_FWD_LS,
            };
        }
        if self.strip {
            options |= RemapOptions::STRIP;
        }
        if self.do_everything {
            options |= RemapOptions::ALL;
        }

        (!options.is_empty()).then_some(options)
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter: &str = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let mut config: RemapConfig = match &cli.config {
        Some(path) => load_config(path)?,
        None => RemapConfig::default(),
    };
    if let Some(options) = cli.flag_options() {
        config.options = options;
    }
    config.verbosity = config.verbosity.max(u32::from(cli.verbose));
    log::info!("remapping with options {:?}", config.options);

    std::fs::create_dir_all(&cli.output).with_context(|| {
        format!("Failed to create output directory: {}", cli.output.display())
    })?;

    let pb = create_progress_bar("Remapping modules...");
    for input in &cli.inputs {
        pb.set_message(format!("Remapping {}", input.display()));
        let stats = remap_file(input, &cli.output, &config)?;
        if cli.stats {
            let report = serde_json::json!({
                "file": input.display().to_string(),
                "stats": stats,
            });
            pb.suspend(|| println!("{}", report));
        }
        pb.tick();
    }
    pb.finish_with_message(format!("Remapped {} modules", cli.inputs.len()));

    Ok(())
}

fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb
}
