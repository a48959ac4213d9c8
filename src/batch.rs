//! Convert a set of tab files to MusicXML files in one output directory.
//!
//! Inputs come from explicit file names and from a directory scan. Each tab
//! `<stem>.<suffix>` is written to `<outdir>/<stem>.xml`. Existing outputs
//! are left alone unless `overwrite` is set. A file that fails is logged and
//! counted; the others are still converted.

use crate::config::Config;
use crate::error::BtabError;
use crate::musicxml::to_musicxml;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub infiles: Vec<PathBuf>,
    pub indir: Option<PathBuf>,
    pub outdir: PathBuf,
    pub overwrite: bool,
    /// Log the full error chain of failed files
    pub verbose: bool,
}

/// What happened to each input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub converted: Vec<PathBuf>,
    /// Inputs whose output already existed
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<PathBuf>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

pub fn run(options: &BatchOptions, config: &Config) -> Result<BatchReport, BtabError> {
    fs::create_dir_all(&options.outdir).map_err(|e| BtabError::io(&options.outdir, e))?;

    let suffix = config.extension();
    // Keyed by stem so each output is written once; explicit files win
    let mut inputs: BTreeMap<String, PathBuf> = BTreeMap::new();

    if let Some(indir) = &options.indir {
        if !indir.is_dir() {
            return Err(BtabError::NotADirectory(indir.clone()));
        }
        let entries = fs::read_dir(indir).map_err(|e| BtabError::io(indir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| BtabError::io(indir, e))?.path();
            if path.is_file() && has_suffix(&path, suffix) {
                if let Some(stem) = stem_of(&path) {
                    inputs.insert(stem, path);
                }
            }
        }
    }

    for path in &options.infiles {
        if !path.is_file() {
            log::error!("Input file '{}' not found", path.display());
        } else if !has_suffix(path, suffix) {
            log::warn!("Ignoring '{}': not a .{} file", path.display(), suffix);
        } else if let Some(stem) = stem_of(path) {
            inputs.insert(stem, path.clone());
        }
    }

    let mut report = BatchReport::default();
    for (stem, input) in inputs {
        let output = options.outdir.join(format!("{}.xml", stem));
        if output.exists() && !options.overwrite {
            log::info!("Skipping {}: {} exists", input.display(), output.display());
            report.skipped.push(input);
            continue;
        }

        log::info!("Conversion : {} -> {}", input.display(), output.display());
        match convert_one(&input, &output, config) {
            Ok(()) => report.converted.push(input),
            Err(e) => {
                log::error!("Conversion failed for {}: {}", input.display(), e);
                if options.verbose {
                    let mut source = e.source();
                    while let Some(cause) = source {
                        log::debug!("  caused by: {}", cause);
                        source = cause.source();
                    }
                }
                report.failed.push(input);
            }
        }
    }

    log::info!(
        "{} converted, {} skipped, {} failed",
        report.converted.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(report)
}

fn convert_one(input: &Path, output: &Path, config: &Config) -> Result<(), BtabError> {
    let conversion = crate::convert_file(input, config)?;
    let xml = to_musicxml(&conversion.document);
    fs::write(output, xml).map_err(|e| BtabError::io(output, e))
}

/// True if `path` ends with `.suffix`
pub fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext == suffix.trim_start_matches('.'))
}

fn stem_of(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}
