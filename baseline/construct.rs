// ========================================================================================
//
//                          PER-CHROMOSOME ANNOTATION CONSTRUCTION
//
// ========================================================================================
//
// Overlays a BED file of named intervals onto one chromosome's blank annotation
// file and writes one binary-indicator `.annot.gz` per annotation name.

use crate::genome::{ChromosomeData, Genome, GenomeError, Variant, VariantsHeader};
use crate::shared::files::{FilesError, GzTextWriter};
use crate::types::{Chromosome, annotation_path, blank_annot_path};
use itertools::Itertools;
use log::info;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Column appended to every generated annotation file.
pub const ANNOT_COLUMN: &str = "ANNOT";

#[derive(Error, Debug)]
pub enum ConstructError {
    #[error(transparent)]
    Genome(#[from] GenomeError),
    #[error(transparent)]
    Files(#[from] FilesError),
    #[error("'{path}' contains no variants on chromosome {chromosome}.")]
    NoVariants { path: PathBuf, chromosome: Chromosome },
    #[error("Failed to build a pool of {threads} writer threads: {details}")]
    ThreadPool { threads: usize, details: String },
}

/// The files an annotation build reads and writes.
#[derive(Debug, Clone)]
pub struct AnnotationInputs {
    /// Prefix of the blank `{prefix}.{chr}.annot.gz` files.
    pub blank_prefix: PathBuf,
    /// BED file of named intervals.
    pub annotations_bed: PathBuf,
    /// Prefix of the generated `{prefix}.{annotation}.{chr}.annot.gz` files.
    pub output_prefix: PathBuf,
    /// Worker threads for annotating and writing.
    pub processes: usize,
}

/// Builds every annotation file for one chromosome and returns the names of the
/// annotations that were written.
pub fn construct_annot(
    inputs: &AnnotationInputs,
    chromosome: Chromosome,
) -> Result<BTreeSet<String>, ConstructError> {
    let mut genome = Genome::new();

    info!("loading variants on chromosome {chromosome}");
    let blank = blank_annot_path(&inputs.blank_prefix, chromosome);
    genome.load_variants(&blank)?;
    genome.sort_variants();
    if genome.variants(chromosome).is_empty() {
        return Err(ConstructError::NoVariants {
            path: blank,
            chromosome,
        });
    }

    info!("loading annotations on chromosome {chromosome}");
    genome.load_annotations(&inputs.annotations_bed)?;
    let annotations = genome.annotation_names(chromosome);
    genome.sort_annotations();

    info!("annotating variants on chromosome {chromosome}");
    genome.annotate_variants(inputs.processes)?;

    info!(
        "writing output on chromosome {chromosome} ({} annotations)",
        annotations.len()
    );
    write_all_annots(&genome, &annotations, chromosome, inputs)?;

    Ok(annotations)
}

fn write_all_annots(
    genome: &Genome,
    annotations: &BTreeSet<String>,
    chromosome: Chromosome,
    inputs: &AnnotationInputs,
) -> Result<(), ConstructError> {
    let threads = inputs.processes.max(1);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| ConstructError::ThreadPool {
            threads,
            details: e.to_string(),
        })?;

    pool.install(|| {
        annotations
            .par_iter()
            .map(|annotation| {
                write_annot(genome, annotation, chromosome, &inputs.output_prefix).map(|_| ())
            })
            .collect::<Result<Vec<()>, ConstructError>>()
    })?;
    Ok(())
}

/// Writes `{output}.{annotation}.{chr}.annot.gz`: the blank file's header plus an
/// `ANNOT` column, then every variant row plus `1` or `0`. Returns the written path.
pub fn write_annot(
    genome: &Genome,
    annotation: &str,
    chromosome: Chromosome,
    output_prefix: &Path,
) -> Result<PathBuf, ConstructError> {
    let path = annotation_path(output_prefix, annotation, chromosome);
    let header = genome.header().ok_or_else(|| ConstructError::NoVariants {
        path: path.clone(),
        chromosome,
    })?;
    let data = genome
        .chromosome(chromosome)
        .ok_or_else(|| ConstructError::NoVariants {
            path: path.clone(),
            chromosome,
        })?;

    let mut writer = GzTextWriter::create(&path)?;
    writer.write_str(&header_line(header))?;

    let mut line = String::new();
    for variant in data.variants() {
        line.clear();
        line.push_str(&variant.row);
        line.push('\t');
        line.push_str(indicator(data, variant, annotation));
        line.push('\n');
        writer.write_str(&line)?;
    }
    writer.finish()?;
    Ok(path)
}

fn header_line(header: &VariantsHeader) -> String {
    format!(
        "{}\t{ANNOT_COLUMN}\n",
        header.columns().iter().join("\t")
    )
}

fn indicator(data: &ChromosomeData, variant: &Variant, annotation: &str) -> &'static str {
    if data.has_annotation(variant, annotation) {
        "1"
    } else {
        "0"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::fs::{self, File};
    use std::io::Read;
    use tempfile::tempdir;

    fn read_gz(path: &Path) -> String {
        let mut text = String::new();
        GzDecoder::new(File::open(path).expect("open output"))
            .read_to_string(&mut text)
            .expect("decode output");
        text
    }

    fn write_inputs(dir: &Path) -> AnnotationInputs {
        fs::write(
            dir.join("blank.21.annot.gz"),
            "CHR\tBP\tSNP\tCM\n21\t150\trs2\t0.2\n21\t50\trs1\t0.1\n21\t500\trs3\t0.5\n",
        )
        .unwrap();
        fs::write(
            dir.join("annotations.bed"),
            "chr21\t100\t200\tEnhancer\nchr21\t0\t60\tPromoter\nchr21\t400\t600\tPromoter\nchr2\t0\t1000\tElsewhere\n",
        )
        .unwrap();
        AnnotationInputs {
            blank_prefix: dir.join("blank"),
            annotations_bed: dir.join("annotations.bed"),
            output_prefix: dir.join("out"),
            processes: 2,
        }
    }

    #[test]
    fn construct_writes_one_file_per_annotation_on_the_chromosome() {
        let dir = tempdir().unwrap();
        let inputs = write_inputs(dir.path());

        let names = construct_annot(&inputs, Chromosome(21)).unwrap();
        assert_eq!(
            names,
            BTreeSet::from(["Enhancer".to_string(), "Promoter".to_string()])
        );

        assert_eq!(
            read_gz(&dir.path().join("out.Enhancer.21.annot.gz")),
            "CHR\tBP\tSNP\tCM\tANNOT\n21\t50\trs1\t0.1\t0\n21\t150\trs2\t0.2\t1\n21\t500\trs3\t0.5\t0\n"
        );
        assert_eq!(
            read_gz(&dir.path().join("out.Promoter.21.annot.gz")),
            "CHR\tBP\tSNP\tCM\tANNOT\n21\t50\trs1\t0.1\t1\n21\t150\trs2\t0.2\t0\n21\t500\trs3\t0.5\t1\n"
        );
        assert!(!dir.path().join("out.Elsewhere.21.annot.gz").exists());
    }

    #[test]
    fn missing_blank_file_is_an_error() {
        let dir = tempdir().unwrap();
        let mut inputs = write_inputs(dir.path());
        inputs.blank_prefix = dir.path().join("absent");
        assert!(matches!(
            construct_annot(&inputs, Chromosome(21)),
            Err(ConstructError::Genome(GenomeError::Files(_)))
        ));
    }

    #[test]
    fn blank_file_for_another_chromosome_is_rejected() {
        let dir = tempdir().unwrap();
        let inputs = write_inputs(dir.path());
        fs::copy(
            dir.path().join("blank.21.annot.gz"),
            dir.path().join("blank.5.annot.gz"),
        )
        .unwrap();
        assert!(matches!(
            construct_annot(&inputs, Chromosome(5)),
            Err(ConstructError::NoVariants { .. })
        ));
    }
}
