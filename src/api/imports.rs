//! Bulk import of line-oriented data.

use std::{io::Read, path::Path};

use crate::{
    client::Client,
    error::Result,
    import::{self, ImportConfig, ImportSource},
    types::ImportOutput,
};

/// Bulk import service.
#[derive(Clone)]
pub struct ImportsService {
    client: Client,
}

impl ImportsService {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Starts an import into `{table}/` of bucket `database`.
    pub fn bulk(&self, database: impl Into<String>, table: impl Into<String>) -> BulkImportRequest {
        self.with_config(ImportConfig::new(database, table))
    }

    /// Starts an import from a prepared configuration.
    pub fn with_config(&self, config: ImportConfig) -> BulkImportRequest {
        BulkImportRequest {
            client: self.client.clone(),
            config,
        }
    }
}

/// Request builder for a bulk import.
pub struct BulkImportRequest {
    client: Client,
    config: ImportConfig,
}

impl BulkImportRequest {
    /// Object name prefix. Defaults to `label`.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.config = self.config.label(label);
        self
    }

    /// Concurrent uploads. Defaults to 1.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.config = self.config.jobs(jobs);
        self
    }

    /// Uncompressed bytes per object. Defaults to 100 MiB.
    pub fn split_size(mut self, bytes: usize) -> Self {
        self.config = self.config.split_size(bytes);
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    /// Imports each path in order; `-` reads standard input.
    pub fn send<I, P>(self, paths: I) -> Result<ImportOutput>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let sources: Vec<_> = paths.into_iter().map(ImportSource::parse).collect();
        import::run(&self.client, &self.config, &sources)
    }

    /// Imports an already-open, uncompressed stream.
    pub fn send_reader<R: Read>(self, reader: R) -> Result<ImportOutput> {
        self.config.validate()?;
        let first = import::existing_suffix(&self.client, &self.config)?;
        let objects = import::import_reader(&self.client, &self.config, reader, first)?;
        Ok(ImportOutput { objects })
    }
}
