// ========================================================================================
//
//                          THE EXTERNAL LD SCORE TOOL INVOKER
//
// ========================================================================================
//
// LD scores are computed by `ldsc.py --l2`, run as a subprocess once per
// (annotation, chromosome) pair against the annotation file written by `construct`.

use crate::shared::env::Environment;
use crate::types::{Chromosome, annotation_path, annotation_prefix, with_suffix};
use log::{debug, info};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;

/// Window size passed as `--ld-wind-cm`.
pub const LD_WINDOW_CM: &str = "1";

#[derive(Error, Debug)]
pub enum LdscError {
    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("ldsc exited with {status} for annotation '{annotation}' on chromosome {chromosome}")]
    Failed {
        annotation: String,
        chromosome: Chromosome,
        status: ExitStatus,
    },
}

/// How to launch `ldsc.py`: directly, or through a specific interpreter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdscTool {
    pub python: Option<PathBuf>,
    pub script: PathBuf,
}

impl LdscTool {
    /// The tool as laid out by `env`: the conda interpreter is used when it exists,
    /// otherwise the script is executed directly.
    pub fn from_environment(env: &Environment) -> Self {
        let python = env.anaconda_python();
        Self {
            python: python.is_file().then_some(python),
            script: env.ldsc_script(),
        }
    }

    fn command(&self) -> Command {
        match &self.python {
            Some(python) => {
                let mut command = Command::new(python);
                command.arg(&self.script);
                command
            }
            None => Command::new(&self.script),
        }
    }

    fn program(&self) -> &Path {
        self.python.as_deref().unwrap_or(&self.script)
    }
}

/// One `ldsc.py --l2` job.
#[derive(Debug, Clone)]
pub struct LdscCommand<'a> {
    pub plink_prefix: &'a Path,
    pub snp_prefix: &'a Path,
    pub output_prefix: &'a Path,
    pub annotation: &'a str,
    pub chromosome: Chromosome,
}

impl LdscCommand<'_> {
    /// The argument list, in the fixed order ldsc expects.
    pub fn args(&self) -> Vec<OsString> {
        let chr = self.chromosome.to_string();
        vec![
            "--l2".into(),
            "--bfile".into(),
            with_suffix(self.plink_prefix, &chr).into_os_string(),
            "--ld-wind-cm".into(),
            LD_WINDOW_CM.into(),
            "--annot".into(),
            annotation_path(self.output_prefix, self.annotation, self.chromosome).into_os_string(),
            "--out".into(),
            annotation_prefix(self.output_prefix, self.annotation, self.chromosome)
                .into_os_string(),
            "--print-snps".into(),
            with_suffix(self.snp_prefix, &format!("{chr}.snp")).into_os_string(),
        ]
    }
}

/// Runs one job to completion. A non-zero exit status is an error.
pub fn run_ldsc(tool: &LdscTool, job: &LdscCommand<'_>) -> Result<(), LdscError> {
    let mut command = tool.command();
    command.args(job.args());
    debug!("Running {command:?}");
    info!(
        "computing LD scores for annotation {} on chromosome {}",
        job.annotation, job.chromosome
    );

    let status = command.status().map_err(|source| LdscError::Spawn {
        program: tool.program().to_path_buf(),
        source,
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(LdscError::Failed {
            annotation: job.annotation.to_string(),
            chromosome: job.chromosome,
            status,
        })
    }
}
