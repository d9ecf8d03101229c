//! Streaming text file adapter.
//!
//! Reads a LibSVM file (or, with the `csv` feature, a CSV file) in chunks of
//! rows. Files whose name ends with `.gz` are decompressed on the fly.
//!
//! LibSVM lines have the form `label[:weight] [qid:id] index:value ...` with
//! zero-based feature indices. Blank lines are skipped and `#` starts a
//! comment.

use super::{Adapter, AdapterKind, Batch, CsrBlock};
use crate::core::constants::DEFAULT_FILE_CHUNK_ROWS;
use crate::core::error::{DMatrixError, Result};
use crate::core::types::ADAPTER_UNKNOWN_SIZE;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// Text format of the input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileFormat {
    /// `label[:weight] [qid:id] index:value ...`
    LibSvm,
    /// Delimited text with the label in `label_column`. Empty fields are missing.
    #[cfg(feature = "csv")]
    Csv {
        /// Column holding the label
        label_column: usize,
        /// Whether the first record is a header
        has_header: bool,
        /// Field delimiter
        delimiter: u8,
    },
}

impl FileFormat {
    /// Pick a format from the file extension: `.csv` (optionally `.csv.gz`)
    /// is CSV with a header and the label first, anything else is LibSVM.
    pub fn from_path(path: &Path) -> Self {
        #[cfg(feature = "csv")]
        {
            let name = path.to_string_lossy().to_lowercase();
            if name.ends_with(".csv") || name.ends_with(".csv.gz") {
                return FileFormat::Csv {
                    label_column: 0,
                    has_header: true,
                    delimiter: b',',
                };
            }
        }
        #[cfg(not(feature = "csv"))]
        let _ = path;
        FileFormat::LibSvm
    }
}

enum Source {
    LibSvm {
        reader: Box<dyn BufRead>,
        line_no: usize,
    },
    #[cfg(feature = "csv")]
    Csv {
        reader: csv::Reader<Box<dyn Read>>,
        label_column: usize,
    },
}

fn open_raw(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path)?;
    let gzipped = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("gz"));
    if gzipped {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

fn parse_f32(token: &str, what: &str, path: &Path, line_no: usize) -> Result<f32> {
    token.parse::<f32>().map_err(|_| {
        DMatrixError::dataset(format!(
            "{}:{}: cannot parse {} `{}`",
            path.display(),
            line_no,
            what,
            token
        ))
    })
}

/// Parsed LibSVM row.
struct LibSvmRow {
    label: f32,
    weight: Option<f32>,
    qid: Option<u64>,
    entries: Vec<(u32, f32)>,
}

fn parse_libsvm_line(line: &str, path: &Path, line_no: usize) -> Result<Option<LibSvmRow>> {
    let content = line.split('#').next().unwrap_or("").trim();
    if content.is_empty() {
        return Ok(None);
    }
    let mut tokens = content.split_whitespace();
    let head = match tokens.next() {
        Some(head) => head,
        None => return Ok(None),
    };
    let (label, weight) = match head.split_once(':') {
        Some((label, weight)) => (
            parse_f32(label, "label", path, line_no)?,
            Some(parse_f32(weight, "weight", path, line_no)?),
        ),
        None => (parse_f32(head, "label", path, line_no)?, None),
    };

    let mut row = LibSvmRow {
        label,
        weight,
        qid: None,
        entries: Vec::new(),
    };
    for token in tokens {
        let (key, value) = token.split_once(':').ok_or_else(|| {
            DMatrixError::dataset(format!(
                "{}:{}: expected `index:value`, got `{}`",
                path.display(),
                line_no,
                token
            ))
        })?;
        if key == "qid" {
            let qid = value.parse::<u64>().map_err(|_| {
                DMatrixError::dataset(format!(
                    "{}:{}: cannot parse qid `{}`",
                    path.display(),
                    line_no,
                    value
                ))
            })?;
            row.qid = Some(qid);
            continue;
        }
        let index = key.parse::<u32>().map_err(|_| {
            DMatrixError::dataset(format!(
                "{}:{}: cannot parse feature index `{}`",
                path.display(),
                line_no,
                key
            ))
        })?;
        row.entries
            .push((index, parse_f32(value, "feature value", path, line_no)?));
    }
    Ok(Some(row))
}

/// Streaming adapter over a text file.
pub struct FileAdapter {
    path: PathBuf,
    format: FileFormat,
    chunk_rows: usize,
    source: Option<Source>,
    block: CsrBlock,
}

impl FileAdapter {
    /// Open `path`, choosing the format from its extension.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        Self::with_format(path, FileFormat::from_path(path))
    }

    /// Open `path` with an explicit format.
    pub fn with_format<P: AsRef<Path>>(path: P, format: FileFormat) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(DMatrixError::IO {
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} does not exist", path.display()),
                ),
            });
        }
        Ok(FileAdapter {
            path,
            format,
            chunk_rows: DEFAULT_FILE_CHUNK_ROWS,
            source: None,
            block: CsrBlock::new(),
        })
    }

    /// Number of rows per batch.
    pub fn with_chunk_rows(mut self, chunk_rows: usize) -> Self {
        self.chunk_rows = chunk_rows.max(1);
        self
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_source(&self) -> Result<Source> {
        let raw = open_raw(&self.path)?;
        match &self.format {
            FileFormat::LibSvm => Ok(Source::LibSvm {
                reader: Box::new(BufReader::new(raw)),
                line_no: 0,
            }),
            #[cfg(feature = "csv")]
            FileFormat::Csv {
                label_column,
                has_header,
                delimiter,
            } => Ok(Source::Csv {
                reader: csv::ReaderBuilder::new()
                    .has_headers(*has_header)
                    .delimiter(*delimiter)
                    .from_reader(raw),
                label_column: *label_column,
            }),
        }
    }

    fn read_libsvm_block(
        path: &Path,
        chunk_rows: usize,
        reader: &mut dyn BufRead,
        line_no: &mut usize,
    ) -> Result<CsrBlock> {
        let mut block = CsrBlock::new();
        let mut labels = Vec::new();
        let mut weights: Vec<Option<f32>> = Vec::new();
        let mut qids: Vec<Option<u64>> = Vec::new();
        let mut line = String::new();

        while block.num_rows() < chunk_rows {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            *line_no += 1;
            if let Some(row) = parse_libsvm_line(&line, path, *line_no)? {
                block.push_row(row.entries);
                labels.push(row.label);
                weights.push(row.weight);
                qids.push(row.qid);
            }
        }

        if weights.iter().any(Option::is_some) {
            block.weights = Some(weights.into_iter().map(|w| w.unwrap_or(1.0)).collect());
        }
        if qids.iter().any(Option::is_some) {
            block.qid = Some(qids.into_iter().map(Option::unwrap_or_default).collect());
        }
        block.labels = Some(labels);
        Ok(block)
    }

    #[cfg(feature = "csv")]
    fn read_csv_block(
        chunk_rows: usize,
        reader: &mut csv::Reader<Box<dyn Read>>,
        label_column: usize,
    ) -> Result<CsrBlock> {
        let mut block = CsrBlock::new();
        let mut labels = Vec::new();
        let mut record = csv::StringRecord::new();

        while block.num_rows() < chunk_rows && reader.read_record(&mut record)? {
            let line_no = record.position().map_or(0, |p| p.line() as usize);
            let mut entries = Vec::with_capacity(record.len());
            let mut label = f32::NAN;
            let mut feature = 0u32;
            for (i, field) in record.iter().enumerate() {
                let field = field.trim();
                if i == label_column {
                    label = field.parse::<f32>().map_err(|_| {
                        DMatrixError::dataset(format!(
                            "line {}: cannot parse label `{}`",
                            line_no, field
                        ))
                    })?;
                    continue;
                }
                if !field.is_empty() {
                    let value = field.parse::<f32>().map_err(|_| {
                        DMatrixError::dataset(format!(
                            "line {}: cannot parse value `{}` in column {}",
                            line_no, field, i
                        ))
                    })?;
                    entries.push((feature, value));
                }
                feature += 1;
            }
            block.push_row(entries);
            labels.push(label);
        }
        block.labels = Some(labels);
        Ok(block)
    }
}

impl std::fmt::Debug for FileAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileAdapter")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("chunk_rows", &self.chunk_rows)
            .finish()
    }
}

impl Adapter for FileAdapter {
    fn before_first(&mut self) -> Result<()> {
        self.source = Some(self.open_source()?);
        self.block = CsrBlock::new();
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        if self.source.is_none() {
            self.before_first()?;
        }
        let block = match self.source.as_mut() {
            Some(Source::LibSvm { reader, line_no }) => {
                Self::read_libsvm_block(&self.path, self.chunk_rows, reader.as_mut(), line_no)?
            }
            #[cfg(feature = "csv")]
            Some(Source::Csv {
                reader,
                label_column,
            }) => Self::read_csv_block(self.chunk_rows, reader, *label_column)?,
            None => CsrBlock::new(),
        };
        self.block = block;
        if self.block.num_rows() > 0 {
            log::debug!(
                "Read {} rows from {}",
                self.block.num_rows(),
                self.path.display()
            );
        }
        Ok(self.block.num_rows() > 0)
    }

    fn value(&self) -> Batch<'_> {
        self.block.as_batch()
    }

    fn num_rows(&self) -> u64 {
        ADAPTER_UNKNOWN_SIZE
    }

    fn num_columns(&self) -> u64 {
        ADAPTER_UNKNOWN_SIZE
    }

    fn kind(&self) -> AdapterKind {
        AdapterKind::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::TempDir;

    const SAMPLE: &str = "1 1:5.0\n# comment line\n0\n\n1:2.0 qid:3 0:2.0 3:1.0\n";

    #[test]
    fn test_parse_libsvm_line() {
        let path = Path::new("x");
        let row = parse_libsvm_line("1.5:0.5 qid:7 2:1 4:2.5 # trailing", path, 1)
            .unwrap()
            .unwrap();
        assert_eq!(row.label, 1.5);
        assert_eq!(row.weight, Some(0.5));
        assert_eq!(row.qid, Some(7));
        assert_eq!(row.entries, vec![(2, 1.0), (4, 2.5)]);
        assert!(parse_libsvm_line("   ", path, 2).unwrap().is_none());
        assert!(parse_libsvm_line("1 3", path, 3).is_err());
        assert!(parse_libsvm_line("x 1:1", path, 4).is_err());
    }

    #[test]
    fn test_read_in_chunks() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.libsvm");
        std::fs::write(&path, SAMPLE).unwrap();

        let mut adapter = FileAdapter::open(&path).unwrap().with_chunk_rows(2);
        adapter.before_first().unwrap();
        assert!(adapter.next().unwrap());
        assert_eq!(adapter.value().size(), 2);
        assert_eq!(adapter.value().meta.labels, Some(&[1.0f32, 0.0][..]));
        assert!(adapter.value().meta.weights.is_none());

        assert!(adapter.next().unwrap());
        let batch = adapter.value();
        assert_eq!(batch.size(), 1);
        assert_eq!(batch.meta.weights, Some(&[2.0f32][..]));
        assert_eq!(batch.meta.qid, Some(&[3u64][..]));
        assert!(!adapter.next().unwrap());

        adapter.before_first().unwrap();
        assert!(adapter.next().unwrap());
        assert_eq!(adapter.num_rows(), ADAPTER_UNKNOWN_SIZE);
    }

    #[test]
    fn test_gzip_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.libsvm.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(SAMPLE.as_bytes()).unwrap();
        encoder.finish().unwrap();

        let mut adapter = FileAdapter::open(&path).unwrap();
        assert!(adapter.next().unwrap());
        assert_eq!(adapter.value().size(), 3);
    }

    #[test]
    fn test_missing_file() {
        assert!(FileAdapter::open("/definitely/not/here.libsvm").is_err());
    }

    #[cfg(feature = "csv")]
    #[test]
    fn test_csv_input() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("train.csv");
        std::fs::write(&path, "y,a,b\n1,0.5,\n0,,2.0\n").unwrap();

        let mut adapter = FileAdapter::open(&path).unwrap();
        assert!(adapter.next().unwrap());
        let block = &adapter.block;
        assert_eq!(block.offset, vec![0, 1, 2]);
        assert_eq!(block.index, vec![0, 1]);
        assert_eq!(block.value, vec![0.5, 2.0]);
        assert_eq!(block.labels.as_deref(), Some(&[1.0f32, 0.0][..]));
    }
}
