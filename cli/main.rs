#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process;

use ldsc2::construct::AnnotationInputs;
use ldsc2::download::{self, DownloadOptions};
use ldsc2::ldsc::LdscTool;
use ldsc2::pipeline::{self, BuildConfig};
use ldsc2::shared::env::Environment;

#[derive(Parser)]
#[command(
    name = "ldsc2",
    version,
    about = "Generate a set of annotation-specific ld-score files for use with the baseline model from Finucane et al. 2015"
)]
pub struct Cli {
    /// Suppress status updates
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build per-annotation .annot.gz files and run ldsc --l2 on each
    Build(BuildArgs),
    /// Download LDSC and its reference data
    Download(DownloadArgs),
    /// Print the resolved directory layout as TOML
    Env {
        /// TOML file overriding the LDSC2_* environment variables
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct BuildArgs {
    /// Prefix of blank .annot.gz files for input
    #[arg(value_name = "prefix/for/blank.annot.gz")]
    pub blank: PathBuf,

    /// Path to .bed file of annotations
    #[arg(value_name = "path/to/annotations.bed")]
    pub annotations: PathBuf,

    /// Prefix for output files
    #[arg(value_name = "prefix/for/output/files")]
    pub output: PathBuf,

    /// Prefix of plink files for input [{plinkfiles}/1000G.EUR.QC]
    #[arg(long, value_name = "prefix/for/plink/files")]
    pub plink_prefix: Option<PathBuf>,

    /// Prefix of snp files for input [{plinkfiles}/1000G_Phase3_plinkfiles]
    #[arg(long, value_name = "prefix/for/snp/files")]
    pub snp_prefix: Option<PathBuf>,

    /// Skip to this chromosome
    #[arg(long, value_name = "int", default_value_t = 1)]
    pub skip_to_chr: u8,

    /// Number of processes
    #[arg(long, value_name = "int", default_value_t = 1)]
    pub processes: usize,

    /// Only write the annotation files; do not run ldsc
    #[arg(long)]
    pub no_ldsc: bool,

    /// Path to ldsc.py [{ldsc_dir}/ldsc.py]
    #[arg(long, value_name = "path/to/ldsc.py")]
    pub ldsc_script: Option<PathBuf>,

    /// Python interpreter to run ldsc.py with [the ldsc conda environment, if installed]
    #[arg(long, value_name = "path/to/python")]
    pub python: Option<PathBuf>,

    /// TOML file overriding the LDSC2_* environment variables
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct DownloadArgs {
    /// Directory to clone LDSC into [{ldsc_dir}]
    #[arg(long, value_name = "path/to/dir/")]
    pub ldsc_dir: Option<PathBuf>,

    /// Destination for downloaded plink files [{plinkfiles}]
    #[arg(long, value_name = "dest/for/plinkfiles/dir")]
    pub plinkfiles: Option<PathBuf>,

    /// Destination for downloaded EAS plink files [{plinkfiles_eas}]
    #[arg(long, value_name = "dest/for/plinkfiles/dir")]
    pub plinkfiles_eas: Option<PathBuf>,

    /// Destination for downloaded SNP files [{hapmap3_snps}]
    #[arg(long, value_name = "dest/for/hapmap3/dir")]
    pub hapmap3_snps: Option<PathBuf>,

    /// TOML file overriding the LDSC2_* environment variables
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_target(false)
        .init();
}

fn run_build(args: BuildArgs) -> Result<(), Box<dyn std::error::Error>> {
    let env = Environment::resolve(args.config.as_deref())?;

    let ldsc = if args.no_ldsc {
        None
    } else {
        let mut tool = LdscTool::from_environment(&env);
        if let Some(script) = args.ldsc_script {
            tool.script = script;
        }
        if let Some(python) = args.python {
            tool.python = Some(python);
        }
        Some(tool)
    };

    let config = BuildConfig {
        inputs: AnnotationInputs {
            blank_prefix: args.blank,
            annotations_bed: args.annotations,
            output_prefix: args.output,
            processes: args.processes,
        },
        plink_prefix: args
            .plink_prefix
            .unwrap_or_else(|| env.default_plink_prefix()),
        snp_prefix: args.snp_prefix.unwrap_or_else(|| env.default_snp_prefix()),
        skip_to_chr: args.skip_to_chr,
        ldsc,
    };
    config.validate()?;

    if let Some(parent) = config.inputs.output_prefix.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let summary = pipeline::run(&config)?;
    println!(
        "Wrote {} annotation files across {} chromosomes; ran ldsc {} times.",
        summary.annotation_files(),
        summary.annotations.len(),
        summary.ldsc_runs
    );
    Ok(())
}

fn run_download(args: DownloadArgs) -> Result<(), Box<dyn std::error::Error>> {
    let env = Environment::resolve(args.config.as_deref())?;
    let mut options = DownloadOptions::from_environment(&env);
    if let Some(dir) = args.ldsc_dir {
        options.ldsc_dir = dir;
    }
    if let Some(dir) = args.plinkfiles {
        options.plinkfiles_dir = dir;
    }
    if let Some(dir) = args.plinkfiles_eas {
        options.plinkfiles_eas_dir = dir;
    }
    if let Some(dir) = args.hapmap3_snps {
        options.hapmap3_snps_dir = dir;
    }
    download::download(&options)?;
    Ok(())
}

fn run_env(config: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let env = Environment::resolve(config.as_deref())?;
    print!("{}", env.to_toml()?);
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let Cli { quiet, command } = cli;
    init_logging(quiet);

    let result = match command {
        Some(Commands::Build(args)) => run_build(args),
        Some(Commands::Download(args)) => run_download(args),
        Some(Commands::Env { config }) => run_env(config),
        None => {
            let _ = Cli::command().print_help();
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
