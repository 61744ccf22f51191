//! Persisted corpus artifacts.
//!
//! A corpus is a pair of files: an `(N, D)` float matrix in NumPy `.npy`
//! format and a `_chunks.jsonl` file holding one [`ChunkRecord`] per matrix
//! row, in the same order. Both sides are validated together at load time.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkRecord};

const NPY_MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Chunks plus their embedding matrix, row `i` belonging to chunk `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Corpus {
    chunks: Vec<Chunk>,
    dim: usize,
    matrix: Vec<f32>,
}

impl Corpus {
    /// Pair chunks with a row-major matrix of `chunks.len() * dim` values.
    pub fn new(chunks: Vec<Chunk>, dim: usize, matrix: Vec<f32>) -> Result<Self> {
        if dim == 0 && !chunks.is_empty() {
            return Err(Error::CorpusIntegrity("embedding dimension is 0".into()));
        }
        let rows = if dim == 0 { 0 } else { matrix.len() / dim };
        if matrix.len() != rows * dim || rows != chunks.len() {
            return Err(Error::CorpusIntegrity(format!(
                "embedding matrix has {rows} rows of dimension {dim} but metadata has {} chunks",
                chunks.len()
            )));
        }
        if let Some(pos) = matrix.iter().position(|v| !v.is_finite()) {
            return Err(Error::CorpusIntegrity(format!("non-finite value in embedding row {}", pos / dim.max(1))));
        }
        if let Some((i, id)) = first_duplicate_id(&chunks) {
            return Err(Error::CorpusIntegrity(format!("duplicate chunk_id '{id}' at row {i}")));
        }
        Ok(Self { chunks, dim, matrix })
    }

    /// Build from one vector per chunk; every vector must have the same length.
    pub fn from_rows(chunks: Vec<Chunk>, rows: Vec<Vec<f32>>) -> Result<Self> {
        if rows.len() != chunks.len() {
            return Err(Error::CorpusIntegrity(format!("{} embedding rows for {} chunks", rows.len(), chunks.len())));
        }
        let dim = rows.first().map_or(0, Vec::len);
        let mut matrix = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(Error::CorpusIntegrity(format!("embedding row {i} has dimension {} (expected {dim})", row.len())));
            }
            matrix.extend(row);
        }
        Self::new(chunks, dim, matrix)
    }

    pub fn empty(dim: usize) -> Self { Self { chunks: Vec::new(), dim, matrix: Vec::new() } }

    pub fn len(&self) -> usize { self.chunks.len() }
    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }
    pub fn dim(&self) -> usize { self.dim }
    pub fn chunks(&self) -> &[Chunk] { &self.chunks }

    pub fn row(&self, i: usize) -> &[f32] { &self.matrix[i * self.dim..(i + 1) * self.dim] }

    pub fn into_parts(self) -> (Vec<Chunk>, usize, Vec<f32>) { (self.chunks, self.dim, self.matrix) }

    /// Reject a corpus whose dimension differs from the configured one.
    pub fn expect_dim(&self, expected: usize) -> Result<()> {
        if self.dim != expected {
            return Err(Error::CorpusIntegrity(format!("corpus dimension {} does not match expected {expected}", self.dim)));
        }
        Ok(())
    }
}

fn first_duplicate_id(chunks: &[Chunk]) -> Option<(usize, String)> {
    let mut seen = HashSet::with_capacity(chunks.len());
    chunks.iter().enumerate().find(|(_, c)| !seen.insert(c.chunk_id.as_str())).map(|(i, c)| (i, c.chunk_id.clone()))
}

/// Metadata file that accompanies an embeddings file: `x.npy` -> `x_chunks.jsonl`.
pub fn metadata_path_for(embeddings_path: &Path) -> PathBuf {
    let name = embeddings_path.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
    let stem = name.strip_suffix(".npy").unwrap_or(&name);
    embeddings_path.with_file_name(format!("{stem}_chunks.jsonl"))
}

/// Load and cross-validate an embeddings file and its metadata file.
pub fn load_corpus(embeddings_path: &Path, metadata_path: &Path) -> Result<Corpus> {
    let start = Instant::now();
    let matrix = read_npy(embeddings_path)?;
    let records = read_metadata(metadata_path)?;
    if matrix.rows != records.len() {
        return Err(Error::CorpusIntegrity(format!(
            "{} has {} rows but {} has {} records",
            embeddings_path.display(),
            matrix.rows,
            metadata_path.display(),
            records.len()
        )));
    }
    let chunks = records.into_iter().map(Chunk::from_record).collect::<Result<Vec<_>>>()?;
    let corpus = Corpus::new(chunks, matrix.cols, matrix.data)?;
    info!(chunks = corpus.len(), dim = corpus.dim(), elapsed_ms = start.elapsed().as_millis() as u64, "loaded corpus");
    Ok(corpus)
}

/// Dense 2-D float matrix as stored in an `.npy` file.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyMatrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f32>,
}

/// Read a C-ordered 2-D `f4`/`f8` array; `f8` values are narrowed to `f32`.
pub fn read_npy(path: &Path) -> Result<NpyMatrix> {
    let bytes = fs::read(path)?;
    parse_npy(&bytes).map_err(|e| match e {
        Error::CorpusIntegrity(msg) => Error::CorpusIntegrity(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn parse_npy(bytes: &[u8]) -> Result<NpyMatrix> {
    let bad = |msg: &str| Error::CorpusIntegrity(format!("invalid npy: {msg}"));
    if bytes.len() < 10 || &bytes[..6] != NPY_MAGIC {
        return Err(bad("missing magic string"));
    }
    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 { return Err(bad("truncated header")); }
            (u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize, 12)
        }
        v => return Err(bad(&format!("unsupported version {v}"))),
    };
    let data_start = header_start + header_len;
    if bytes.len() < data_start { return Err(bad("truncated header")); }
    let header = std::str::from_utf8(&bytes[header_start..data_start]).map_err(|_| bad("header is not utf-8"))?;

    let descr = header_value(header, "descr").ok_or_else(|| bad("missing descr"))?;
    let descr = descr.trim_matches(|c| c == '\'' || c == '"');
    let fortran = header_value(header, "fortran_order").ok_or_else(|| bad("missing fortran_order"))?;
    if fortran.starts_with("True") {
        return Err(bad("fortran-ordered arrays are not supported"));
    }
    let shape = header_value(header, "shape").ok_or_else(|| bad("missing shape"))?;
    let dims = parse_shape(shape).ok_or_else(|| bad("malformed shape"))?;
    let (rows, cols) = match dims.as_slice() {
        [r, c] => (*r, *c),
        other => return Err(bad(&format!("expected a 2-D array, got {} dimensions", other.len()))),
    };

    let (little, width) = match descr {
        "<f4" | "=f4" => (true, 4),
        ">f4" => (false, 4),
        "<f8" | "=f8" => (true, 8),
        ">f8" => (false, 8),
        other => return Err(bad(&format!("unsupported dtype '{other}'"))),
    };
    let expected = rows.checked_mul(cols).and_then(|n| n.checked_mul(width)).ok_or_else(|| bad("shape overflows"))?;
    let payload = &bytes[data_start..];
    if payload.len() != expected {
        return Err(bad(&format!("payload is {} bytes, expected {expected} for shape ({rows}, {cols})", payload.len())));
    }
    let data = if width == 4 {
        payload
            .chunks_exact(4)
            .map(|b| {
                let raw = [b[0], b[1], b[2], b[3]];
                if little { f32::from_le_bytes(raw) } else { f32::from_be_bytes(raw) }
            })
            .collect()
    } else {
        payload
            .chunks_exact(8)
            .map(|b| {
                let raw = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
                (if little { f64::from_le_bytes(raw) } else { f64::from_be_bytes(raw) }) as f32
            })
            .collect()
    };
    debug!(rows, cols, dtype = descr, "parsed npy matrix");
    Ok(NpyMatrix { rows, cols, data })
}

/// Raw text of `'key': value` inside the header dict, up to the next top-level comma.
fn header_value<'a>(header: &'a str, key: &str) -> Option<&'a str> {
    let quoted = format!("'{key}'");
    let at = header.find(&quoted)? + quoted.len();
    let rest = header[at..].trim_start().strip_prefix(':')?.trim_start();
    if rest.starts_with('(') {
        let end = rest.find(')')?;
        return Some(&rest[..=end]);
    }
    let end = rest.find([',', '}']).unwrap_or(rest.len());
    Some(rest[..end].trim())
}

fn parse_shape(shape: &str) -> Option<Vec<usize>> {
    let inner = shape.trim().strip_prefix('(')?.strip_suffix(')')?;
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.trim_end_matches('L').parse().ok())
        .collect()
}

/// Write a little-endian `f4` C-ordered matrix in `.npy` v1.0 format.
pub fn write_npy(path: &Path, rows: usize, cols: usize, data: &[f32]) -> Result<()> {
    if rows.checked_mul(cols) != Some(data.len()) {
        return Err(Error::CorpusIntegrity(format!("{} values do not fill shape ({rows}, {cols})", data.len())));
    }
    if let Some(parent) = path.parent() { fs::create_dir_all(parent)?; }
    let mut header = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': ({rows}, {cols}), }}");
    // magic(6) + version(2) + len(2) + header + '\n' must be a multiple of 64
    let unpadded = 10 + header.len() + 1;
    header.push_str(&" ".repeat((64 - unpadded % 64) % 64));
    header.push('\n');
    let header_len = u16::try_from(header.len()).map_err(|_| Error::CorpusIntegrity("npy header too long".into()))?;

    let mut w = BufWriter::new(fs::File::create(path)?);
    w.write_all(NPY_MAGIC)?;
    w.write_all(&[1, 0])?;
    w.write_all(&header_len.to_le_bytes())?;
    w.write_all(header.as_bytes())?;
    for v in data { w.write_all(&v.to_le_bytes())?; }
    w.flush()?;
    Ok(())
}

/// Read one JSON record per non-blank line.
pub fn read_metadata(path: &Path) -> Result<Vec<ChunkRecord>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let record: ChunkRecord = serde_json::from_str(line.trim()).map_err(|e| {
            Error::CorpusIntegrity(format!("{} line {}: {e}", path.display(), line_no + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

pub fn write_metadata(path: &Path, records: &[ChunkRecord]) -> Result<()> {
    if let Some(parent) = path.parent() { fs::create_dir_all(parent)?; }
    let mut w = BufWriter::new(fs::File::create(path)?);
    for record in records {
        serde_json::to_writer(&mut w, record)?;
        w.write_all(b"\n")?;
    }
    w.flush()?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub parts: Vec<PathBuf>,
    pub rows: usize,
    pub dim: usize,
    pub embeddings_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Stack every `*part*.npy` in `dir` (sorted by file name) into `<out_stem>.npy`
/// and concatenate their metadata files into `<out_stem>_chunks.jsonl`.
pub fn merge_parts(dir: &Path, out_stem: &Path) -> Result<MergeReport> {
    let mut parts: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .filter(|p| {
            let name = p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default();
            name.ends_with(".npy") && name.contains("part")
        })
        .collect();
    parts.sort();
    if parts.is_empty() {
        return Err(Error::NotFound(format!("no *part*.npy files under {}", dir.display())));
    }

    let mut data = Vec::new();
    let mut lines = Vec::new();
    let mut dim = None;
    let mut rows = 0usize;
    for part in &parts {
        let m = read_npy(part)?;
        match dim {
            Some(d) if d != m.cols => {
                return Err(Error::CorpusIntegrity(format!("{} has dimension {} but earlier parts have {d}", part.display(), m.cols)));
            }
            _ => dim = Some(m.cols),
        }
        let meta_path = metadata_path_for(part);
        let part_lines: Vec<String> = BufReader::new(fs::File::open(&meta_path)?)
            .lines()
            .collect::<std::io::Result<Vec<_>>>()?
            .into_iter()
            .filter(|l| !l.trim().is_empty())
            .collect();
        if part_lines.len() != m.rows {
            return Err(Error::CorpusIntegrity(format!("{} has {} rows but {} has {} records", part.display(), m.rows, meta_path.display(), part_lines.len())));
        }
        info!(part = %part.display(), rows = m.rows, "merging corpus part");
        rows += m.rows;
        data.extend(m.data);
        lines.extend(part_lines);
    }
    let dim = dim.unwrap_or(0);

    let embeddings_path = out_stem.with_extension("npy");
    let metadata_path = metadata_path_for(&embeddings_path);
    write_npy(&embeddings_path, rows, dim, &data)?;
    let mut w = BufWriter::new(fs::File::create(&metadata_path)?);
    for line in &lines { writeln!(w, "{line}")?; }
    w.flush()?;
    Ok(MergeReport { parts, rows, dim, embeddings_path, metadata_path })
}

/// Summary of a loaded corpus for integrity checks.
#[derive(Debug, Clone, Serialize)]
pub struct CorpusReport {
    pub rows: usize,
    pub dim: usize,
    pub documents: usize,
    pub sections: BTreeMap<String, usize>,
}

pub fn check_corpus(corpus: &Corpus) -> CorpusReport {
    let mut docs = HashSet::new();
    let mut sections = BTreeMap::new();
    for chunk in corpus.chunks() {
        docs.insert(chunk.doc_id.as_str());
        *sections.entry(chunk.section_label.clone()).or_insert(0) += 1;
    }
    CorpusReport { rows: corpus.len(), dim: corpus.dim(), documents: docs.len(), sections }
}
