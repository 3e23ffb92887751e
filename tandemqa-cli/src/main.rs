use clap::Parser;
use std::path::PathBuf;
use tandemqa_core::{
    ExternalPolisher, PipelineController, PipelineError, PipelineRequest, PipelineState, RunFlags,
    StageSet, TandemMapper,
};

mod config;
mod error;

use config::Config;

#[derive(Parser, Debug)]
#[command(name = "tandemqa")]
#[command(about = "TandemQA - quality assessment of tandem-repeat assemblies with long reads")]
#[command(version)]
#[command(long_about = "
TandemQA evaluates one or more assemblies of a tandem-repeat region using long
reads as ground truth. Reads are mapped with tandemmapper, then coverage,
breakpoint, k-mer, pairwise, discordance and (optionally) monomer analyses are
run over the alignments.

Examples:
  tandemqa --nano reads.fq -o out asm1.fa asm2.fa -l \"first,second\"
  tandemqa --pacbio clr.fa -o out -m monomers.fa asm.fa
  tandemqa --nano reads.fq --hifi hifi.fq -o out --only-polish asm.fa
")]
struct Cli {
    /// Assembly files (FASTA, optionally gzipped)
    #[arg(value_parser = existing_file)]
    assemblies: Vec<PathBuf>,

    /// File with ONT reads
    #[arg(long = "nano", value_parser = existing_file)]
    nano_reads: Option<PathBuf>,

    /// File with PacBio CLR reads
    #[arg(long = "pacbio", value_parser = existing_file)]
    pacbio_reads: Option<PathBuf>,

    /// Output folder
    #[arg(short = 'o', required_unless_present = "print_config")]
    out_dir: Option<PathBuf>,

    /// Threads (defaults to the configuration file, then the number of CPUs)
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// Monomer sequence
    #[arg(short = 'm')]
    monomers: Option<PathBuf>,

    /// Comma separated list of assembly labels
    #[arg(short = 'l')]
    labels: Option<String>,

    /// File with PacBio HiFi reads
    #[arg(long = "hifi")]
    hifi_reads: Option<PathBuf>,

    /// Run polishing only
    #[arg(long)]
    only_polish: bool,

    /// Do not perform nucleotide alignment (use with caution)
    #[arg(long = "no-nucl-align")]
    no_nucl_alignment: bool,

    /// Do not reuse old files
    #[arg(short = 'f', long)]
    no_reuse: bool,

    /// Configuration file path
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,
}

fn existing_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.exists() {
        Ok(path)
    } else {
        Err(format!("path '{}' does not exist", value))
    }
}

fn setup_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn build_request(cli: Cli, config: &Config) -> Result<PipelineRequest, PipelineError> {
    let out_dir = cli
        .out_dir
        .ok_or_else(|| PipelineError::configuration("an output folder (-o) is required"))?;
    let threads = cli.threads.unwrap_or(config.general.threads);
    if threads == 0 {
        return Err(PipelineError::configuration("thread count must be at least 1"));
    }

    Ok(PipelineRequest {
        assembly_files: cli.assemblies,
        labels: cli.labels,
        nano_reads: cli.nano_reads,
        pacbio_reads: cli.pacbio_reads,
        hifi_reads: cli.hifi_reads,
        monomers: cli.monomers,
        out_dir,
        threads,
        flags: RunFlags {
            reuse: !cli.no_reuse,
            only_polish: cli.only_polish,
            no_nucl_alignment: cli.no_nucl_alignment,
        },
    })
}

fn run(cli: Cli) -> Result<(), PipelineError> {
    let config = Config::load(cli.config.as_deref())
        .map_err(|e| PipelineError::configuration(format!("{:#}", e)))?;

    if cli.print_config {
        let rendered = config
            .to_toml()
            .map_err(|e| PipelineError::configuration(format!("{:#}", e)))?;
        println!("{}", rendered);
        return Ok(());
    }

    let request = build_request(cli, &config)?;

    let controller = PipelineController::new(
        Box::new(TandemMapper::new(Some(config.tools.mapper.clone()))),
        Box::new(ExternalPolisher::new(config.tools.polisher.clone())),
        StageSet::external(&config.stages),
    );

    let outcome = controller.run(&request)?;
    match outcome.terminal {
        PipelineState::PolishOnly => log::info!("TandemQA finished"),
        _ => log::info!(
            "TandemQA finished. Reports for different metrics are saved to {}",
            outcome.report_dir.display()
        ),
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);
    log::info!("TandemQA started");

    if let Err(err) = run(cli) {
        error::print_error_and_exit(&err);
    }
}
