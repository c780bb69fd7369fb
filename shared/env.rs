//! # Directory layout
//!
//! Resolves where the LDSC checkout, its Python environment and the reference
//! panels live. Every location has a built-in default derived from a base
//! directory, can be overridden by an `LDSC2_*` environment variable, and can be
//! overridden again by an optional TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DIR_VAR: &str = "LDSC2_DIR";
pub const LDSC_DIR_VAR: &str = "LDSC2_LDSC_DIR";
pub const ANACONDA_DIR_VAR: &str = "LDSC2_ANACONDA_DIR";
pub const PLINKFILES_VAR: &str = "LDSC2_PLINKFILES";
pub const PLINKFILES_EAS_VAR: &str = "LDSC2_PLINKFILES_EAS";
pub const HAPMAP3_SNPS_VAR: &str = "LDSC2_HAPMAP3_SNPS";

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse configuration file '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// The resolved directory layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    pub dir: PathBuf,
    pub ldsc_dir: PathBuf,
    pub anaconda_dir: PathBuf,
    pub plinkfiles: PathBuf,
    pub plinkfiles_eas: PathBuf,
    pub hapmap3_snps: PathBuf,
}

/// The optional overrides accepted from a TOML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentFile {
    pub dir: Option<PathBuf>,
    pub ldsc_dir: Option<PathBuf>,
    pub anaconda_dir: Option<PathBuf>,
    pub plinkfiles: Option<PathBuf>,
    pub plinkfiles_eas: Option<PathBuf>,
    pub hapmap3_snps: Option<PathBuf>,
}

impl EnvironmentFile {
    pub fn load(path: &Path) -> Result<Self, EnvError> {
        let text = fs::read_to_string(path).map_err(|source| EnvError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| EnvError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Environment {
    /// Resolves the layout from the process environment and an optional TOML file.
    pub fn resolve(config_file: Option<&Path>) -> Result<Self, EnvError> {
        let file = match config_file {
            Some(path) => EnvironmentFile::load(path)?,
            None => EnvironmentFile::default(),
        };
        Ok(Self::from_sources(|key| std::env::var(key).ok(), &file))
    }

    /// Resolves the layout from an arbitrary variable lookup. Precedence, lowest first:
    /// defaults, variables, file.
    pub fn from_sources<F>(lookup: F, file: &EnvironmentFile) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        let dir = file
            .dir
            .clone()
            .or_else(|| var(DIR_VAR))
            .unwrap_or_else(|| default_base_dir(&lookup));

        let pick = |from_file: &Option<PathBuf>, key: &str, default: &str| {
            from_file
                .clone()
                .or_else(|| var(key))
                .unwrap_or_else(|| dir.join(default))
        };

        Self {
            ldsc_dir: pick(&file.ldsc_dir, LDSC_DIR_VAR, "ldsc"),
            anaconda_dir: pick(&file.anaconda_dir, ANACONDA_DIR_VAR, "anaconda2"),
            plinkfiles: pick(&file.plinkfiles, PLINKFILES_VAR, "1000G_EUR_Phase3_plink"),
            plinkfiles_eas: pick(
                &file.plinkfiles_eas,
                PLINKFILES_EAS_VAR,
                "1000G_Phase3_EAS_plinkfiles",
            ),
            hapmap3_snps: pick(&file.hapmap3_snps, HAPMAP3_SNPS_VAR, "hapmap3_snps"),
            dir,
        }
    }

    /// The interpreter of the conda environment LDSC is installed into.
    pub fn anaconda_python(&self) -> PathBuf {
        self.anaconda_dir
            .join("envs")
            .join("ldsc")
            .join("bin")
            .join("python")
    }

    pub fn ldsc_script(&self) -> PathBuf {
        self.ldsc_dir.join("ldsc.py")
    }

    /// Default `--plink-prefix` for the baseline build.
    pub fn default_plink_prefix(&self) -> PathBuf {
        self.plinkfiles.join("1000G.EUR.QC")
    }

    /// Default `--snp-prefix` for the baseline build.
    pub fn default_snp_prefix(&self) -> PathBuf {
        self.plinkfiles.join("1000G_Phase3_plinkfiles")
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}

fn default_base_dir<F>(lookup: &F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    match lookup("HOME").filter(|home| !home.trim().is_empty()) {
        Some(home) => Path::new(&home).join(".ldsc2"),
        None => PathBuf::from("ldsc2"),
    }
}
