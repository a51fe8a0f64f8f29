//! Batch ingestion of line-oriented data as many gzip objects.

use std::{
    fs::File,
    io::{BufRead, BufReader, Read, Write},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use flate2::{Compression, read::MultiGzDecoder, write::GzEncoder};

use crate::{
    client::Client,
    error::{Error, Result},
    pool::{self, Chunks},
    types::ImportOutput,
};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const DEFAULT_LABEL: &str = "label";
const DEFAULT_SPLIT_SIZE: usize = 100 * 1024 * 1024;

/// Parameters of one import run.
///
/// Objects land in bucket `database` under `{table}/{label}_{n}.gz`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportConfig {
    database: String,
    table: String,
    label: String,
    jobs: usize,
    split_size: usize,
}

impl ImportConfig {
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
            label: DEFAULT_LABEL.to_string(),
            jobs: 1,
            split_size: DEFAULT_SPLIT_SIZE,
        }
    }

    /// Object name prefix inside the table. Must not start with `_` or `.`.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Number of concurrent uploads.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Uncompressed bytes per object, rounded up to the next line end.
    pub fn split_size(mut self, bytes: usize) -> Self {
        self.split_size = bytes;
        self
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.database.is_empty() {
            return Err(Error::parameter_invalid("database must not be empty"));
        }
        if self.table.is_empty() {
            return Err(Error::parameter_invalid("table must not be empty"));
        }
        if self.label.is_empty() {
            return Err(Error::parameter_invalid("label must not be empty"));
        }
        if self.label.starts_with('_') || self.label.starts_with('.') {
            return Err(Error::parameter_invalid(
                "label should not start with '_' or '.'",
            ));
        }
        if self.jobs == 0 {
            return Err(Error::parameter_invalid("jobs must be at least 1"));
        }
        if self.split_size == 0 {
            return Err(Error::parameter_invalid("split size must be non-zero"));
        }
        Ok(())
    }

    fn object_key(&self, suffix: u64) -> String {
        format!("{}/{}_{suffix}.gz", self.table, self.label)
    }

    fn object_label(&self, suffix: u64) -> String {
        format!("/{}/{}/{}_{suffix}.gz", self.database, self.table, self.label)
    }
}

/// Where import data comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportSource {
    Stdin,
    Path(PathBuf),
}

impl ImportSource {
    /// `-` means standard input, anything else is a file path.
    pub fn parse(arg: impl AsRef<Path>) -> Self {
        let arg = arg.as_ref();
        if arg == Path::new("-") {
            Self::Stdin
        } else {
            Self::Path(arg.to_path_buf())
        }
    }

    fn open(&self) -> Result<Box<dyn Read>> {
        match self {
            Self::Stdin => decompressing(std::io::stdin().lock()),
            Self::Path(path) => {
                let file = File::open(path).map_err(|e| {
                    Error::parameter_invalid(format!("cannot open {}: {e}", path.display()))
                })?;
                decompressing(file)
            }
        }
    }
}

impl std::fmt::Display for ImportSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdin => f.write_str("-"),
            Self::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Wraps `reader` in a gzip decoder when it starts with the gzip magic.
fn decompressing<R: Read + 'static>(reader: R) -> Result<Box<dyn Read>> {
    let mut reader = BufReader::new(reader);
    let head = reader
        .fill_buf()
        .map_err(|e| Error::transport("failed to read import source", Some(Box::new(e))))?;

    if head.starts_with(&GZIP_MAGIC) {
        Ok(Box::new(MultiGzDecoder::new(reader)))
    } else {
        Ok(Box::new(reader))
    }
}

/// Highest `{label}_N` number found in `keys`, plus one. Zero when none match.
pub(crate) fn next_label_suffix<'a, I>(keys: I, label: &str) -> Result<u64>
where
    I: IntoIterator<Item = &'a str>,
{
    let needle = format!("{label}_");
    keys.into_iter()
        .flat_map(|key| {
            key.match_indices(needle.as_str()).filter_map(|(at, _)| {
                let rest = &key[at + needle.len()..];
                let end = rest
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(rest.len());
                rest[..end].parse::<u64>().ok()
            })
        })
        .max()
        .map_or(Ok(0), |max| {
            max.checked_add(1).ok_or_else(|| {
                Error::parameter_invalid(format!("no suffix left after {label}_{max}"))
            })
        })
}

pub(crate) fn existing_suffix(client: &Client, config: &ImportConfig) -> Result<u64> {
    let pager = client
        .objects()
        .list(config.database.as_str())
        .prefix(format!("{}/{}", config.table, config.label))
        .pager();

    let mut next = 0;
    for page in pager {
        let page = page?;
        next = next.max(next_label_suffix(page.keys(), &config.label)?);
    }
    Ok(next)
}

fn compress(chunk: &[u8]) -> Result<Bytes> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(chunk)
        .and_then(|()| encoder.finish())
        .map(Bytes::from)
        .map_err(|e| Error::transport("gzip compression failed", Some(Box::new(e))))
}

/// Imports every source in order. Suffixes continue from what the table
/// already holds and advance by the number of chunks each source yields.
pub(crate) fn run(
    client: &Client,
    config: &ImportConfig,
    sources: &[ImportSource],
) -> Result<ImportOutput> {
    config.validate()?;
    let mut suffix = existing_suffix(client, config)?;

    #[cfg(feature = "tracing")]
    tracing::info!(
        database = %config.database,
        table = %config.table,
        label = %config.label,
        first_suffix = suffix,
        "starting import"
    );

    let mut output = ImportOutput::default();
    for source in sources {
        let reader = source.open()?;
        let imported = import_reader(client, config, reader, suffix)?;

        #[cfg(feature = "tracing")]
        tracing::info!(source = %source, objects = imported.len(), "imported source");

        suffix = suffix
            .checked_add(imported.len() as u64)
            .ok_or_else(|| Error::parameter_invalid("object suffix overflow"))?;
        output.objects.extend(imported);
    }
    Ok(output)
}

/// Imports one already-decoded stream starting at `first_suffix`.
pub(crate) fn import_reader<R: Read>(
    client: &Client,
    config: &ImportConfig,
    reader: R,
    first_suffix: u64,
) -> Result<Vec<String>> {
    let objects = client.objects();
    let chunks = Chunks::new(reader, config.split_size, first_suffix).line_aligned();

    let mut done = pool::run_bounded(config.jobs, chunks, |(suffix, chunk)| {
        let body = compress(&chunk)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(suffix, raw = chunk.len(), compressed = body.len(), "uploading chunk");

        objects
            .put(config.database.as_str(), config.object_key(suffix))
            .content_type("application/x-gzip")
            .body(body)
            .send()?;
        Ok(suffix)
    })?;

    done.sort_unstable();
    Ok(done.into_iter().map(|n| config.object_label(n)).collect())
}
