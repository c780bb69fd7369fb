// ========================================================================================
//
//                        THE GENOME MODEL: VARIANTS & ANNOTATIONS
//
// ========================================================================================
//
// ### Purpose ###
//
// Holds the variants of one or more blank annotation files, grouped per chromosome,
// together with named sets of BED intervals. Its central operation assigns to every
// variant the names of all annotations with an interval covering it.
//
// ### Coordinates ###
//
// Variant positions are 1-based (`BP` column). BED intervals are 0-based half-open
// `[start, end)`. A variant at `bp` is covered by an interval iff `start < bp <= end`.

use crate::shared::files::{FilesError, TextSource, open_text_source};
use crate::types::{Chromosome, parse_chromosome_label};
use ahash::AHashMap;
use log::{debug, warn};
use rayon::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Annotation name given to BED records that lack a fourth column.
pub const DEFAULT_ANNOTATION_NAME: &str = "ANNOT";

#[derive(Error, Debug)]
pub enum GenomeError {
    #[error(transparent)]
    Files(#[from] FilesError),
    #[error("'{path}' is empty; expected a header line with CHR and BP columns.")]
    EmptyVariantFile { path: PathBuf },
    #[error("The header of '{path}' has no '{column}' column.")]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error(
        "The header of '{path}' does not match previously loaded variants.\n  expected: {expected}\n  found:    {found}"
    )]
    HeaderMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
    #[error("Line {line} of '{path}' is malformed: {details}")]
    Malformed {
        path: PathBuf,
        line: usize,
        details: String,
    },
    #[error("Failed to build a pool of {threads} threads: {details}")]
    ThreadPool { threads: usize, details: String },
}

/// The column names of a blank annotation file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantsHeader {
    columns: Vec<String>,
    chr_index: usize,
    bp_index: usize,
}

impl VariantsHeader {
    pub fn parse(line: &str, path: &Path) -> Result<Self, GenomeError> {
        let columns: Vec<String> = line.split('\t').map(|c| c.trim().to_string()).collect();
        let find = |column: &'static str| {
            columns
                .iter()
                .position(|c| c == column)
                .ok_or_else(|| GenomeError::MissingColumn {
                    path: path.to_path_buf(),
                    column,
                })
        };
        let chr_index = find("CHR")?;
        let bp_index = find("BP")?;
        Ok(Self {
            columns,
            chr_index,
            bp_index,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One row of a blank annotation file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub chromosome: Chromosome,
    pub position: u64,
    /// The row's fields exactly as read, tab-joined, in header order.
    pub row: String,
    /// Indices into the owning chromosome's sorted annotation names; ascending.
    annotations: Vec<u32>,
}

impl Variant {
    pub fn new(chromosome: Chromosome, position: u64, row: String) -> Self {
        Self {
            chromosome,
            position,
            row,
            annotations: Vec::new(),
        }
    }
}

/// A BED record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
}

impl Interval {
    #[inline]
    pub fn covers(&self, bp: u64) -> bool {
        self.start < bp && bp <= self.end
    }
}

/// Everything the genome knows about one chromosome.
#[derive(Debug, Default)]
pub struct ChromosomeData {
    variants: Vec<Variant>,
    annotations: AHashMap<String, Vec<Interval>>,
    /// Names in sorted order; index `i` is the id stored on variants. Only valid
    /// after annotation.
    annotation_ids: Vec<String>,
}

impl ChromosomeData {
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn annotation_names(&self) -> BTreeSet<String> {
        self.annotations.keys().cloned().collect()
    }

    pub fn intervals(&self, name: &str) -> Option<&[Interval]> {
        self.annotations.get(name).map(Vec::as_slice)
    }

    /// Whether `variant` was assigned the annotation `name` by the last annotation pass.
    pub fn has_annotation(&self, variant: &Variant, name: &str) -> bool {
        match self.annotation_id(name) {
            Some(id) => variant.annotations.binary_search(&id).is_ok(),
            None => false,
        }
    }

    /// The names assigned to `variant`, in sorted order.
    pub fn annotations_of<'a>(&'a self, variant: &'a Variant) -> impl Iterator<Item = &'a str> {
        variant
            .annotations
            .iter()
            .map(|&id| self.annotation_ids[id as usize].as_str())
    }

    fn annotation_id(&self, name: &str) -> Option<u32> {
        self.annotation_ids
            .binary_search_by(|probe| probe.as_str().cmp(name))
            .ok()
            .map(|i| i as u32)
    }

    fn annotate(&mut self) {
        let mut names: Vec<String> = self.annotations.keys().cloned().collect();
        names.sort();

        for variant in &mut self.variants {
            variant.annotations.clear();
        }

        // Per name, a merged view of its intervals swept against the sorted variants.
        let hits: Vec<Vec<usize>> = names
            .iter()
            .map(|name| {
                let intervals = self.intervals(name).unwrap_or(&[]);
                covered_variant_indices(&self.variants, &merge_intervals(intervals))
            })
            .collect();

        for (id, indices) in hits.into_iter().enumerate() {
            for index in indices {
                self.variants[index].annotations.push(id as u32);
            }
        }
        self.annotation_ids = names;
    }
}

/// Per-chromosome variants and annotations, with the header they were read under.
#[derive(Debug)]
pub struct Genome {
    header: Option<VariantsHeader>,
    chromosomes: BTreeMap<Chromosome, ChromosomeData>,
    variants_sorted: bool,
    annotations_sorted: bool,
}

impl Default for Genome {
    fn default() -> Self {
        Self::new()
    }
}

impl Genome {
    pub fn new() -> Self {
        Self {
            header: None,
            chromosomes: BTreeMap::new(),
            variants_sorted: true,
            annotations_sorted: true,
        }
    }

    pub fn header(&self) -> Option<&VariantsHeader> {
        self.header.as_ref()
    }

    pub fn chromosome(&self, chromosome: Chromosome) -> Option<&ChromosomeData> {
        self.chromosomes.get(&chromosome)
    }

    pub fn variants(&self, chromosome: Chromosome) -> &[Variant] {
        self.chromosomes
            .get(&chromosome)
            .map(ChromosomeData::variants)
            .unwrap_or(&[])
    }

    /// The names of every annotation with at least one interval on `chromosome`.
    pub fn annotation_names(&self, chromosome: Chromosome) -> BTreeSet<String> {
        self.chromosomes
            .get(&chromosome)
            .map(ChromosomeData::annotation_names)
            .unwrap_or_default()
    }

    pub fn insert_variant(&mut self, variant: Variant) {
        let data = self.chromosomes.entry(variant.chromosome).or_default();
        if let Some(last) = data.variants.last() {
            if last.position > variant.position {
                self.variants_sorted = false;
            }
        }
        data.variants.push(variant);
    }

    pub fn insert_interval(&mut self, chromosome: Chromosome, name: &str, interval: Interval) {
        let intervals = self
            .chromosomes
            .entry(chromosome)
            .or_default()
            .annotations
            .entry(name.to_string())
            .or_default();
        if let Some(last) = intervals.last() {
            if *last > interval {
                self.annotations_sorted = false;
            }
        }
        intervals.push(interval);
    }

    /// Reads a blank annotation file (plain or gzip) and appends its rows.
    pub fn load_variants(&mut self, path: &Path) -> Result<usize, GenomeError> {
        let mut source = open_text_source(path)?;
        let header = loop {
            match source.next_line()? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => break VariantsHeader::parse(line, path)?,
                None => {
                    return Err(GenomeError::EmptyVariantFile {
                        path: path.to_path_buf(),
                    });
                }
            }
        };

        match &self.header {
            Some(existing) if existing.columns != header.columns => {
                return Err(GenomeError::HeaderMismatch {
                    path: path.to_path_buf(),
                    expected: existing.columns.join("\t"),
                    found: header.columns.join("\t"),
                });
            }
            Some(_) => {}
            None => self.header = Some(header.clone()),
        }

        let mut loaded = 0usize;
        while let Some(variant) = next_variant(source.as_mut(), &header)? {
            self.insert_variant(variant);
            loaded += 1;
        }
        debug!("Loaded {loaded} variants from '{}'", path.display());
        Ok(loaded)
    }

    /// Stable sort of every chromosome's variants by position.
    pub fn sort_variants(&mut self) {
        self.chromosomes
            .par_iter_mut()
            .for_each(|(_, data)| data.variants.sort_by_key(|v| v.position));
        self.variants_sorted = true;
    }

    /// Reads a BED file (plain or gzip) of named intervals. Records on contigs that
    /// are not a recognised chromosome are skipped.
    pub fn load_annotations(&mut self, path: &Path) -> Result<usize, GenomeError> {
        let mut source = open_text_source(path)?;
        let mut loaded = 0usize;
        let mut skipped_contigs: BTreeSet<String> = BTreeSet::new();

        while let Some(raw) = source.next_line()? {
            let line = raw.to_owned();
            let trimmed = line.trim();
            if trimmed.is_empty()
                || trimmed.starts_with('#')
                || trimmed.starts_with("track")
                || trimmed.starts_with("browser")
            {
                continue;
            }

            let fields: Vec<&str> = trimmed.split('\t').collect();
            if fields.len() < 3 {
                return Err(malformed(
                    source.as_ref(),
                    format!(
                        "expected at least 3 columns (chrom start end), got {}",
                        fields.len()
                    ),
                ));
            }

            let chromosome = match parse_chromosome_label(fields[0]) {
                Ok(chromosome) => chromosome,
                Err(_) => {
                    skipped_contigs.insert(fields[0].to_string());
                    continue;
                }
            };
            let start = parse_coordinate(source.as_ref(), "start", fields[1])?;
            let end = parse_coordinate(source.as_ref(), "end", fields[2])?;
            if end < start {
                return Err(malformed(
                    source.as_ref(),
                    format!("interval end {end} precedes start {start}"),
                ));
            }
            let name = fields
                .get(3)
                .map(|n| n.trim())
                .filter(|n| !n.is_empty())
                .unwrap_or(DEFAULT_ANNOTATION_NAME);

            self.insert_interval(chromosome, name, Interval { start, end });
            loaded += 1;
        }

        if !skipped_contigs.is_empty() {
            let mut contigs: Vec<String> = skipped_contigs.into_iter().collect();
            contigs.sort_by(|a, b| natord::compare(a, b));
            warn!(
                "Skipped intervals on {} unrecognised contig(s) in '{}': {}",
                contigs.len(),
                path.display(),
                contigs.join(", ")
            );
        }
        debug!("Loaded {loaded} intervals from '{}'", path.display());
        Ok(loaded)
    }

    /// Sorts each annotation's intervals by `(start, end)`.
    pub fn sort_annotations(&mut self) {
        self.chromosomes.par_iter_mut().for_each(|(_, data)| {
            for intervals in data.annotations.values_mut() {
                intervals.sort_unstable();
            }
        });
        self.annotations_sorted = true;
    }

    /// Assigns to every variant the names of all annotations covering it. Chromosomes
    /// are processed in parallel on a pool of `processes` threads. Unsorted variants or
    /// intervals are sorted first.
    pub fn annotate_variants(&mut self, processes: usize) -> Result<(), GenomeError> {
        if !self.variants_sorted {
            self.sort_variants();
        }
        if !self.annotations_sorted {
            self.sort_annotations();
        }

        let threads = processes.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| GenomeError::ThreadPool {
                threads,
                details: e.to_string(),
            })?;

        pool.install(|| {
            self.chromosomes
                .par_iter_mut()
                .for_each(|(_, data)| data.annotate());
        });
        Ok(())
    }
}

fn next_variant(
    source: &mut dyn TextSource,
    header: &VariantsHeader,
) -> Result<Option<Variant>, GenomeError> {
    loop {
        let line = match source.next_line()? {
            Some(line) => line.to_owned(),
            None => return Ok(None),
        };
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != header.len() {
            let details = format!(
                "expected {} tab-separated fields to match the header, found {}",
                header.len(),
                fields.len()
            );
            return Err(malformed(&*source, details));
        }

        let chromosome = parse_chromosome_label(fields[header.chr_index])
            .map_err(|details| malformed(&*source, details))?;
        let bp_text = fields[header.bp_index].trim();
        let position = bp_text.parse::<u64>().map_err(|_| {
            malformed(&*source, format!("invalid BP value '{bp_text}'"))
        })?;

        return Ok(Some(Variant::new(chromosome, position, line)));
    }
}

fn parse_coordinate(source: &dyn TextSource, what: &str, text: &str) -> Result<u64, GenomeError> {
    text.trim()
        .parse::<u64>()
        .map_err(|_| malformed(source, format!("invalid {what} '{}'", text.trim())))
}

fn malformed(source: &dyn TextSource, details: String) -> GenomeError {
    GenomeError::Malformed {
        path: source.path().to_path_buf(),
        line: source.line_number(),
        details,
    }
}

/// Merges overlapping or adjacent intervals. Input must be sorted by start.
fn merge_intervals(sorted: &[Interval]) -> Vec<Interval> {
    let mut merged: Vec<Interval> = Vec::with_capacity(sorted.len());
    for &interval in sorted {
        match merged.last_mut() {
            Some(current) if interval.start <= current.end => {
                current.end = current.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Indices of the position-sorted `variants` covered by any of the disjoint,
/// sorted `merged` intervals, in ascending order.
fn covered_variant_indices(variants: &[Variant], merged: &[Interval]) -> Vec<usize> {
    let mut covered = Vec::new();
    let mut next_interval = 0usize;
    for (index, variant) in variants.iter().enumerate() {
        while next_interval < merged.len() && merged[next_interval].end < variant.position {
            next_interval += 1;
        }
        match merged.get(next_interval) {
            Some(interval) if interval.covers(variant.position) => covered.push(index),
            Some(_) => {}
            None => break,
        }
    }
    covered
}
