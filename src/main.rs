use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use rv32gen::analysis::listing::check_listing;
use rv32gen::config::{Extensions, GeneratorConfig};
use rv32gen::consts::rv32::{DEFAULT_MARCH, TOOL_VERSION};
use rv32gen::error::{Result, Rv32GenError};
use rv32gen::random_asm::asm_maker::{generate_batch, write_program_file};
use rv32gen::utils::{parse_hex_u32, parse_seed, resolve_output_dir};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rv32gen")]
#[command(version)]
#[command(about = "RISC-V RV32IMC pseudo random instruction generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one random assembly program
    Generate {
        /// Output assembly file
        output: PathBuf,
        #[command(flatten)]
        args: GenerationArgs,
    },
    /// Generate many random programs in parallel
    Batch {
        /// Number of programs to generate
        #[arg(short = 'n', long, default_value = "8")]
        count: usize,
        /// Number of worker threads (default: number of CPU cores)
        #[arg(short = 'p', long)]
        parallel: Option<usize>,
        /// Fixed output directory
        #[arg(long, conflicts_with = "workspace_dir")]
        output_dir: Option<PathBuf>,
        /// Workspace directory for random output directories (default mode)
        #[arg(long, conflicts_with = "output_dir")]
        workspace_dir: Option<PathBuf>,
        #[command(flatten)]
        args: GenerationArgs,
    },
    /// Check labels, offsets and registers of an existing listing
    Check {
        /// Path to assembly file
        file: PathBuf,
        /// Architecture the listing was generated for
        #[arg(long, default_value = DEFAULT_MARCH)]
        march: String,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Generation knobs; anything left unset falls back to the config file,
/// then to the built-in defaults.
#[derive(Args, Debug, Clone)]
struct GenerationArgs {
    /// Quiet, do not display the banner
    #[arg(short, long)]
    quiet: bool,
    /// Random seed (decimal, or hex with 0x), default derived from the clock
    #[arg(short, long, value_parser = parse_seed)]
    seed: Option<u64>,
    /// Architecture extension letters, e.g. "imc"
    #[arg(long)]
    march: Option<String>,
    /// Include ebreak opcodes (excluded by default)
    #[arg(long)]
    ebreak: bool,
    /// Include ecall opcodes (excluded by default)
    #[arg(long)]
    ecall: bool,
    /// Instruction count in hex, default 0x200
    #[arg(long = "ic", value_parser = parse_hex_u32)]
    instruction_count: Option<u32>,
    /// Load/store base address in hex, default 0x1000
    #[arg(long = "sb", value_parser = parse_hex_u32)]
    base_address: Option<u32>,
    /// Debug level in hex
    #[arg(short, long, value_parser = parse_hex_u32)]
    debug: Option<u32>,
    /// TOML file with generator settings
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl GenerationArgs {
    fn resolve(&self) -> Result<GeneratorConfig> {
        let mut config = match &self.config {
            Some(path) => GeneratorConfig::load(path)?,
            None => GeneratorConfig::default(),
        };
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(march) = &self.march {
            config.march = march.clone();
        }
        if let Some(count) = self.instruction_count {
            config.instruction_count = count;
        }
        if let Some(base) = self.base_address {
            config.base_address = base;
        }
        if let Some(debug) = self.debug {
            config.debug |= debug;
        }
        config.include_ebreak |= self.ebreak;
        config.include_ecall |= self.ecall;
        config.quiet |= self.quiet;

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { output, args } => {
            let mut config = args.resolve()?;
            setup_logging(config.quiet);
            config.resolve_seed();
            print_banner(&config, Some(&output));

            write_program_file(&config, &output)?;
        }
        Commands::Batch {
            count,
            parallel,
            output_dir,
            workspace_dir,
            args,
        } => {
            let mut config = args.resolve()?;
            setup_logging(config.quiet);
            let seed = config.resolve_seed();
            print_banner(&config, None);

            let num_threads = parallel.unwrap_or_else(num_cpus::get);
            rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()
                .map_err(|e| {
                    Rv32GenError::system(format!("Failed to initialize thread pool: {}", e))
                })?;

            let dir = resolve_output_dir(output_dir, workspace_dir, seed)?;
            info!(
                "🚀 Generating {} programs on {} threads into {:?}",
                count, num_threads, dir
            );
            let manifest = generate_batch(&config, &dir, count)?;
            let total: u64 = manifest
                .programs
                .iter()
                .map(|p| u64::from(p.summary.instructions))
                .sum();
            info!("✅ {} programs, {} instructions in total", manifest.programs.len(), total);
        }
        Commands::Check { file, march, json } => {
            setup_logging(false);
            check_file(&file, &march, json)?;
        }
    }

    Ok(())
}

fn check_file(file: &Path, march: &str, json: bool) -> Result<()> {
    if !file.exists() {
        return Err(Rv32GenError::file(format!(
            "Assembly file does not exist: {:?}",
            file
        )));
    }
    let text = fs::read_to_string(file)?;
    let report = check_listing(&text, &Extensions::from_march(march));

    info!(
        "🔍 {:?}: {} instructions, {} constructs, {} labels",
        file,
        report.instructions,
        report.label_ids(),
        report.labels.len()
    );
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    for issue in &report.issues {
        warn!("⚠️ line {}: {}", issue.line, issue.message);
    }
    if report.is_clean() {
        info!("✅ Listing is structurally sound");
    }
    report.into_result().map(|_| ())
}

fn print_banner(config: &GeneratorConfig, output: Option<&Path>) {
    let enabled = |flag: bool| if flag { "Enabled" } else { "Disabled" };
    info!("***********************************************************");
    info!("*** RV32GEN: Risc-V Pseudo Random Instruction Generator ***");
    info!("***               Ver {:<8}                          ***", TOOL_VERSION);
    info!("***********************************************************");
    info!("ebreak generation  : {}", enabled(config.include_ebreak));
    info!("ecall generation   : {}", enabled(config.include_ecall));
    info!(
        "Generate           : 0x{:x}({}) instructions",
        config.instruction_count, config.instruction_count
    );
    info!("Random Seed        : {}", config.effective_seed());
    if let Some(output) = output {
        info!("Output Filename    : {}", output.display());
    }
    info!("Architecture       : {}", config.march);
    info!("Base Address       : 0x{:x}", config.base_address);
}

fn setup_logging(quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Warn
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_timestamp_secs()
        .init();
}
