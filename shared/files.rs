use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use log::debug;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FilesError {
    #[error("Failed to open '{path}': {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("Failed to create '{path}': {source}")]
    Create { path: PathBuf, source: io::Error },
    #[error("Failed to read line {line} of '{path}': {source}")]
    Read {
        path: PathBuf,
        line: usize,
        source: io::Error,
    },
    #[error("Failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// A trait that abstracts sequential, line-oriented access to text data such as
/// blank `.annot` and `.bed` files, regardless of compression.
pub trait TextSource: Send {
    /// The path the lines are read from, for diagnostics.
    fn path(&self) -> &Path;

    /// The 1-based number of the line most recently returned.
    fn line_number(&self) -> usize;

    /// Returns the next line with its terminator stripped, or `None` at EOF.
    fn next_line(&mut self) -> Result<Option<&str>, FilesError>;
}

struct LocalTextSource {
    reader: BufReader<Box<dyn Read + Send>>,
    buffer: String,
    path: PathBuf,
    line_number: usize,
}

impl TextSource for LocalTextSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn line_number(&self) -> usize {
        self.line_number
    }

    fn next_line(&mut self) -> Result<Option<&str>, FilesError> {
        self.buffer.clear();
        let read = self
            .reader
            .read_line(&mut self.buffer)
            .map_err(|source| FilesError::Read {
                path: self.path.clone(),
                line: self.line_number + 1,
                source,
            })?;
        if read == 0 {
            return Ok(None);
        }
        self.line_number += 1;
        let line = self.buffer.trim_end_matches(['\n', '\r']);
        Ok(Some(line))
    }
}

/// Opens a local text file for line-by-line reading. Gzip input is detected by
/// its magic bytes rather than by extension, so `.annot.gz` files that were
/// written uncompressed still load.
pub fn open_text_source(path: &Path) -> Result<Box<dyn TextSource>, FilesError> {
    let open_err = |source| FilesError::Open {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(open_err)?;

    let mut magic = [0u8; 2];
    let mut filled = 0;
    while filled < magic.len() {
        let n = file.read(&mut magic[filled..]).map_err(open_err)?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    file.seek(SeekFrom::Start(0)).map_err(open_err)?;

    let inner: Box<dyn Read + Send> = if filled == magic.len() && is_gzip_magic(&magic) {
        debug!("Reading '{}' as gzip", path.display());
        Box::new(MultiGzDecoder::new(file))
    } else {
        Box::new(file)
    };

    Ok(Box::new(LocalTextSource {
        reader: BufReader::new(inner),
        buffer: String::new(),
        path: path.to_path_buf(),
        line_number: 0,
    }))
}

fn is_gzip_magic(magic: &[u8; 2]) -> bool {
    magic == &[0x1f, 0x8b]
}

/// A buffered, gzip-compressed text writer. Must be closed with [`GzTextWriter::finish`]
/// so the gzip trailer is written.
pub struct GzTextWriter {
    inner: BufWriter<GzEncoder<File>>,
    path: PathBuf,
}

impl GzTextWriter {
    pub fn create(path: &Path) -> Result<Self, FilesError> {
        let file = File::create(path).map_err(|source| FilesError::Create {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            inner: BufWriter::new(GzEncoder::new(file, Compression::default())),
            path: path.to_path_buf(),
        })
    }

    pub fn write_str(&mut self, text: &str) -> Result<(), FilesError> {
        self.inner
            .write_all(text.as_bytes())
            .map_err(|source| self.write_error(source))
    }

    pub fn finish(self) -> Result<(), FilesError> {
        let path = self.path;
        let encoder = self.inner.into_inner().map_err(|e| FilesError::Write {
            path: path.clone(),
            source: e.into_error(),
        })?;
        encoder
            .finish()
            .and_then(|mut file| file.flush())
            .map_err(|source| FilesError::Write { path, source })
    }

    fn write_error(&self, source: io::Error) -> FilesError {
        FilesError::Write {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::fs;
    use tempfile::tempdir;

    fn collect_lines(path: &Path) -> Vec<String> {
        let mut source = open_text_source(path).expect("open source");
        let mut lines = Vec::new();
        while let Some(line) = source.next_line().expect("read line") {
            lines.push(line.to_string());
        }
        lines
    }

    #[test]
    fn plain_and_gzip_sources_yield_identical_lines() {
        let dir = tempdir().unwrap();
        let plain = dir.path().join("plain.annot.gz");
        fs::write(&plain, "CHR\tBP\r\n1\t100\n").unwrap();

        let gz = dir.path().join("real.annot.gz");
        let mut writer = GzTextWriter::create(&gz).unwrap();
        writer.write_str("CHR\tBP\n1\t100\n").unwrap();
        writer.finish().unwrap();

        let expected = vec!["CHR\tBP".to_string(), "1\t100".to_string()];
        assert_eq!(collect_lines(&plain), expected);
        assert_eq!(collect_lines(&gz), expected);
    }

    #[test]
    fn gz_writer_produces_valid_gzip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.gz");
        let mut writer = GzTextWriter::create(&path).unwrap();
        writer.write_str("hello\n").unwrap();
        writer.finish().unwrap();

        let mut decoded = String::new();
        GzDecoder::new(File::open(&path).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "hello\n");
    }

    #[test]
    fn line_numbers_track_reads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lines.txt");
        fs::write(&path, "a\nb\n").unwrap();
        let mut source = open_text_source(&path).unwrap();
        assert_eq!(source.line_number(), 0);
        source.next_line().unwrap();
        source.next_line().unwrap();
        assert_eq!(source.line_number(), 2);
        assert!(source.next_line().unwrap().is_none());
    }

    #[test]
    fn missing_file_reports_path() {
        let err = open_text_source(Path::new("/definitely/not/here.bed")).err().unwrap();
        assert!(err.to_string().contains("/definitely/not/here.bed"));
    }
}
