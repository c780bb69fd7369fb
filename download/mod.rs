// ========================================================================================
//
//                              REFERENCE DATA DOWNLOADER
//
// ========================================================================================

use crate::shared::env::Environment;
use crate::types::with_suffix;
use dwldutil::{DLFile, Downloader};
use flate2::read::GzDecoder;
use indicatif::ProgressStyle;
use log::info;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tar::Archive;
use thiserror::Error;

pub const LDSC_GITHUB_REPO: &str = "https://github.com/bulik/ldsc.git";
pub const HAPMAP3_SNPS_URL: &str =
    "https://data.broadinstitute.org/alkesgroup/LDSCORE/hapmap3_snps.tgz";
pub const PLINKFILES_URL: &str =
    "https://data.broadinstitute.org/alkesgroup/LDSCORE/1000G_Phase3_plinkfiles.tgz";
pub const PLINKFILES_EAS_URL: &str =
    "https://data.broadinstitute.org/alkesgroup/LDSCORE/1000G_Phase3_EAS_plinkfiles.tgz";

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("I/O error for '{path}': {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Failed to launch git: {0}")]
    GitSpawn(io::Error),
    #[error("git clone of {url} into '{path}' failed with {status}")]
    GitClone {
        url: String,
        path: PathBuf,
        status: std::process::ExitStatus,
    },
    #[error("Network download failed: {0}")]
    Network(String),
    #[error("Failed to create async runtime: {0}")]
    RuntimeCreation(io::Error),
    #[error("Failed to extract '{archive}' into '{destination}': {source}")]
    Extract {
        archive: PathBuf,
        destination: PathBuf,
        source: io::Error,
    },
}

/// Where each downloaded component goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    /// The LDSC checkout; `ldsc.py` ends up directly inside it.
    pub ldsc_dir: PathBuf,
    pub hapmap3_snps_dir: PathBuf,
    pub plinkfiles_dir: PathBuf,
    pub plinkfiles_eas_dir: PathBuf,
}

impl DownloadOptions {
    pub fn from_environment(env: &Environment) -> Self {
        Self {
            ldsc_dir: env.ldsc_dir.clone(),
            hapmap3_snps_dir: env.hapmap3_snps.clone(),
            plinkfiles_dir: env.plinkfiles.clone(),
            plinkfiles_eas_dir: env.plinkfiles_eas.clone(),
        }
    }

    /// The reference archives paired with the directory each extracts into.
    pub fn archives(&self) -> [DataArchive; 3] {
        [
            DataArchive::new(HAPMAP3_SNPS_URL, &self.hapmap3_snps_dir),
            DataArchive::new(PLINKFILES_URL, &self.plinkfiles_dir),
            DataArchive::new(PLINKFILES_EAS_URL, &self.plinkfiles_eas_dir),
        ]
    }
}

/// One `.tgz` reference archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataArchive {
    pub url: String,
    /// The extraction target.
    pub data_dir: PathBuf,
}

impl DataArchive {
    fn new(url: &str, data_dir: &Path) -> Self {
        Self {
            url: url.to_string(),
            data_dir: data_dir.to_path_buf(),
        }
    }

    /// `{data_dir}.tgz`
    pub fn archive_path(&self) -> PathBuf {
        with_suffix(&self.data_dir, "tgz")
    }
}

/// What has to happen to bring one archive up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStep {
    /// Already extracted.
    Present,
    /// Downloaded but not yet extracted.
    Extract,
    DownloadAndExtract,
}

pub fn plan_archive(archive: &DataArchive) -> ArchiveStep {
    if archive.data_dir.is_dir() {
        ArchiveStep::Present
    } else if archive.archive_path().is_file() {
        ArchiveStep::Extract
    } else {
        ArchiveStep::DownloadAndExtract
    }
}

/// Clones LDSC and fetches and extracts the reference archives. Components that are
/// already in place are left alone.
pub fn download(options: &DownloadOptions) -> Result<(), DownloadError> {
    let ldsc_dir = &options.ldsc_dir;
    if ldsc_dir.exists() {
        info!("LDSC repository already present at {}", ldsc_dir.display());
    } else {
        info!("Cloning LDSC repository to {}", ldsc_dir.display());
        clone_repository(LDSC_GITHUB_REPO, ldsc_dir)?;
    }

    let mut to_fetch = Vec::new();
    let mut to_extract = Vec::new();
    for archive in options.archives() {
        match plan_archive(&archive) {
            ArchiveStep::Present => {
                info!("Data already present at {}", archive.data_dir.display())
            }
            ArchiveStep::Extract => to_extract.push(archive),
            ArchiveStep::DownloadAndExtract => {
                info!("Downloading data to {}", archive.archive_path().display());
                to_fetch.push(archive.clone());
                to_extract.push(archive);
            }
        }
    }

    if !to_fetch.is_empty() {
        fetch_archives(&to_fetch)?;
    }

    to_extract.par_iter().try_for_each(|archive| {
        info!("Extracting data to {}", archive.data_dir.display());
        extract_tgz(&archive.archive_path(), &archive.data_dir)
    })
}

fn clone_repository(url: &str, target: &Path) -> Result<(), DownloadError> {
    if let Some(parent) = target.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| DownloadError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let status = Command::new("git")
        .arg("clone")
        .arg(url)
        .arg(target)
        .status()
        .map_err(DownloadError::GitSpawn)?;

    if !status.success() {
        let _ = fs::remove_dir_all(target);
        return Err(DownloadError::GitClone {
            url: url.to_string(),
            path: target.to_path_buf(),
            status,
        });
    }
    Ok(())
}

/// Downloads every archive in parallel to its `{data_dir}.tgz` path.
fn fetch_archives(archives: &[DataArchive]) -> Result<(), DownloadError> {
    for archive in archives {
        if let Some(parent) = archive.archive_path().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| DownloadError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(DownloadError::RuntimeCreation)?;

    runtime.block_on(async {
        let mut downloader = Downloader::new();
        for archive in archives {
            let file_to_download = DLFile::new()
                .with_url(&archive.url)
                .with_path(&archive.archive_path().to_string_lossy());
            // Each call to `add_file` consumes the downloader and returns a new one.
            downloader = downloader.add_file(file_to_download);
        }

        let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .map_err(|e| DownloadError::Network(format!("invalid progress template: {e}")))?
            .progress_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");
        downloader
            .with_style(style)
            .with_max_concurrent_downloads(3)
            .with_max_redirections(5)
            .start();
        Ok::<(), DownloadError>(())
    })?;

    for archive in archives {
        if !archive.archive_path().is_file() {
            return Err(DownloadError::Network(format!(
                "{} was not saved to {}",
                archive.url,
                archive.archive_path().display()
            )));
        }
    }
    Ok(())
}

/// Unpacks a gzip-compressed tarball into `destination`.
///
/// The archive is unpacked into `{destination}.partial` first and moved into place
/// only once every entry is written, so `destination` never exists half-filled.
pub fn extract_tgz(archive: &Path, destination: &Path) -> Result<(), DownloadError> {
    let extract_err = |source| DownloadError::Extract {
        archive: archive.to_path_buf(),
        destination: destination.to_path_buf(),
        source,
    };
    let staging = with_suffix(destination, "partial");
    if staging.exists() {
        fs::remove_dir_all(&staging).map_err(extract_err)?;
    }

    let unpacked = File::open(archive).and_then(|file| {
        fs::create_dir_all(&staging)?;
        Archive::new(GzDecoder::new(file)).unpack(&staging)
    });
    if let Err(source) = unpacked {
        let _ = fs::remove_dir_all(&staging);
        return Err(extract_err(source));
    }

    fs::rename(&staging, destination).map_err(|source| {
        let _ = fs::remove_dir_all(&staging);
        extract_err(source)
    })
}
