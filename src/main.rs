use btab::batch::{self, BatchOptions};
use btab::logger;
use btab::Config;
use clap::{ArgGroup, Parser};
use std::fs::File;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "btab2mxml")]
#[command(about = "Convert ASCII bass tablature to MusicXML")]
#[command(group(ArgGroup::new("input").required(true).multiple(true).args(["infile", "indir"])))]
struct Args {
    /// Tab files to convert
    #[arg(long, num_args = 1..)]
    infile: Vec<PathBuf>,

    /// Directory scanned for tab files
    #[arg(long)]
    indir: Option<PathBuf>,

    /// Output directory
    #[arg(long, default_value = "out")]
    outdir: PathBuf,

    /// Extension of tab files (default: btab)
    #[arg(long)]
    suffix: Option<String>,

    /// Overwrite existing .xml files
    #[arg(long)]
    overwrite: bool,

    /// Show debug output and error details on the console
    #[arg(long)]
    verbose: bool,

    /// YAML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log file, truncated on each run (default: app.log)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading configuration: {}", e);
                process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(suffix) = &args.suffix {
        config.suffix = suffix.clone();
    }

    let log_path = args
        .log_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.log_file));
    let log_file = match File::create(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Cannot open log file '{}': {}", log_path.display(), e);
            None
        }
    };
    if let Err(e) = logger::init(args.verbose, log_file) {
        eprintln!("Cannot install logger: {}", e);
    }

    let options = BatchOptions {
        infiles: args.infile,
        indir: args.indir,
        outdir: args.outdir,
        overwrite: args.overwrite,
        verbose: args.verbose,
    };

    match batch::run(&options, &config) {
        Ok(report) => {
            if !report.is_success() {
                process::exit(1);
            }
        }
        Err(e) => {
            log::error!("{}", e);
            process::exit(1);
        }
    }
}
