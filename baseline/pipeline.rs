// ========================================================================================
//
//                          THE BASELINE BUILD: MAIN LOOP
//
// ========================================================================================
//
// For each autosome from the starting chromosome through 22: construct the
// annotation files, then run `ldsc.py --l2` once per annotation.

use crate::construct::{AnnotationInputs, ConstructError, construct_annot};
use crate::ldsc::{LdscCommand, LdscError, LdscTool, run_ldsc};
use crate::types::{AUTOSOMES, Chromosome};
use log::info;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Annotating with many workers holds one copy of the genome per worker.
pub const MAX_PROCESSES: usize = 16;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(
        "{0} processes, really? Annotating those variants takes a lot of memory when running in parallel, and more processes means more memory consumption. You almost certainly don't need more than 16 processes for this."
    )]
    TooManyProcesses(usize),
    #[error("The number of processes must be at least 1.")]
    NoProcesses,
    #[error("Cannot skip to chromosome {0}: expected a value between 1 and 22.")]
    InvalidStartChromosome(u8),
    #[error("Chromosome {chromosome}: {source}")]
    Construct {
        chromosome: Chromosome,
        source: ConstructError,
    },
    #[error(transparent)]
    Ldsc(#[from] LdscError),
}

/// Everything a baseline build needs.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub inputs: AnnotationInputs,
    pub plink_prefix: PathBuf,
    pub snp_prefix: PathBuf,
    pub skip_to_chr: u8,
    /// When `None`, only the annotation files are produced.
    pub ldsc: Option<LdscTool>,
}

impl BuildConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        match self.inputs.processes {
            0 => return Err(PipelineError::NoProcesses),
            n if n > MAX_PROCESSES => return Err(PipelineError::TooManyProcesses(n)),
            _ => {}
        }
        if !AUTOSOMES.contains(&self.skip_to_chr) {
            return Err(PipelineError::InvalidStartChromosome(self.skip_to_chr));
        }
        Ok(())
    }

    pub fn chromosomes(&self) -> impl Iterator<Item = Chromosome> {
        (self.skip_to_chr..=*AUTOSOMES.end()).map(Chromosome)
    }
}

/// What a finished build produced.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    pub annotations: Vec<(Chromosome, BTreeSet<String>)>,
    pub ldsc_runs: usize,
}

impl BuildSummary {
    pub fn annotation_files(&self) -> usize {
        self.annotations.iter().map(|(_, names)| names.len()).sum()
    }
}

pub fn run(config: &BuildConfig) -> Result<BuildSummary, PipelineError> {
    config.validate()?;
    let start = Instant::now();
    let mut summary = BuildSummary::default();

    for chromosome in config.chromosomes() {
        let annotations = construct_annot(&config.inputs, chromosome)
            .map_err(|source| PipelineError::Construct { chromosome, source })?;

        if let Some(tool) = &config.ldsc {
            for annotation in &annotations {
                let job = LdscCommand {
                    plink_prefix: &config.plink_prefix,
                    snp_prefix: &config.snp_prefix,
                    output_prefix: &config.inputs.output_prefix,
                    annotation,
                    chromosome,
                };
                run_ldsc(tool, &job)?;
                summary.ldsc_runs += 1;
            }
        }
        summary.annotations.push((chromosome, annotations));
    }

    info!(
        "Wrote {} annotation files and ran ldsc {} times in {:.2?}",
        summary.annotation_files(),
        summary.ldsc_runs,
        start.elapsed()
    );
    Ok(summary)
}
