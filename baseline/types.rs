// ========================================================================================
//                             High-Level Data Contracts
// ========================================================================================

// This file is ONLY for types that are SHARED BETWEEN FILES, not types that only are used in one file.

use std::fmt;
use std::path::{Path, PathBuf};

/// The autosomes processed by the baseline build, in order.
pub const AUTOSOMES: std::ops::RangeInclusive<u8> = 1..=22;

/// A chromosome identified by its numeric code. Autosomes are 1-22; the sex
/// chromosomes and mitochondrial genome are encoded as 23 (X), 24 (Y) and 25 (MT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Chromosome(pub u8);

impl Chromosome {
    /// The label used inside file names: `1`..`22`, `X`, `Y`, `MT`.
    pub fn file_label(self) -> String {
        match self.0 {
            23 => "X".to_string(),
            24 => "Y".to_string(),
            25 => "MT".to_string(),
            n => format!("{n}"),
        }
    }
}

impl fmt::Display for Chromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_label())
    }
}

pub fn parse_chromosome_label(chr_str: &str) -> Result<Chromosome, String> {
    let mut trimmed = chr_str.trim();

    if trimmed
        .get(..3)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("chr"))
    {
        trimmed = &trimmed[3..];
    }

    if trimmed.eq_ignore_ascii_case("X") {
        return Ok(Chromosome(23));
    }
    if trimmed.eq_ignore_ascii_case("Y") {
        return Ok(Chromosome(24));
    }
    if trimmed.eq_ignore_ascii_case("MT") || trimmed.eq_ignore_ascii_case("M") {
        return Ok(Chromosome(25));
    }

    match trimmed.parse::<u8>() {
        Ok(n) if (1..=25).contains(&n) => Ok(Chromosome(n)),
        _ => Err(format!(
            "Invalid chromosome format '{}'. Expected a number, 'X', 'Y', 'MT', or 'chr' prefix.",
            chr_str.trim()
        )),
    }
}

/// Appends `.{suffix}` to a path prefix without treating the last component's
/// dots as an extension.
pub fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut joined = prefix.as_os_str().to_owned();
    joined.push(".");
    joined.push(suffix);
    PathBuf::from(joined)
}

/// `{blank}.{chr}.annot.gz`: the per-chromosome blank annotation file.
pub fn blank_annot_path(blank_prefix: &Path, chromosome: Chromosome) -> PathBuf {
    with_suffix(blank_prefix, &format!("{chromosome}.annot.gz"))
}

/// `{output}.{annotation}.{chr}`: the prefix shared by every file produced for one
/// annotation on one chromosome.
pub fn annotation_prefix(output_prefix: &Path, annotation: &str, chromosome: Chromosome) -> PathBuf {
    with_suffix(output_prefix, &format!("{annotation}.{chromosome}"))
}

/// `{output}.{annotation}.{chr}.annot.gz`: the generated annotation file.
pub fn annotation_path(output_prefix: &Path, annotation: &str, chromosome: Chromosome) -> PathBuf {
    with_suffix(
        &annotation_prefix(output_prefix, annotation, chromosome),
        "annot.gz",
    )
}
