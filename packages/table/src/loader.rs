//! Delimited text loader.
//!
//! Parses a CSV (optionally gzip-compressed) with a header row into a
//! [`RawTable`] of trimmed strings. No type conversion happens here; that
//! is the job of [`crate::coerce`].

use std::io::Read as _;
use std::path::Path;

use crate::IngestError;

/// Options controlling how delimited text is parsed.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Field delimiter byte (defaults to `,`).
    delimiter: u8,
    /// Whether the input is gzip-compressed.
    is_gzipped: bool,
    /// Optional cap on the number of records to parse.
    max_records: Option<u64>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl LoadOptions {
    /// Comma-delimited, uncompressed, no record limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            delimiter: b',',
            is_gzipped: false,
            max_records: None,
        }
    }

    /// Marks the input as gzip-compressed.
    #[must_use]
    pub const fn with_gzip(mut self, gzipped: bool) -> Self {
        self.is_gzipped = gzipped;
        self
    }

    /// Sets the field delimiter (e.g. `b';'`).
    #[must_use]
    pub const fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Limits the number of records that will be parsed.
    #[must_use]
    pub const fn with_max_records(mut self, max: u64) -> Self {
        self.max_records = Some(max);
        self
    }
}

/// Untyped tabular input: a header row plus rows of trimmed cells.
///
/// Every row has exactly as many cells as there are headers; short lines
/// are padded with empty cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    origin: String,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    /// Builds a raw table directly from headers and rows.
    #[must_use]
    pub fn new(origin: &str, headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            origin: origin.to_owned(),
            headers,
            rows,
        }
    }

    /// Parses delimited text from any reader.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the input is empty, has no header row, a
    /// line has more fields than the header, or the text is not valid CSV.
    pub fn from_reader<R: std::io::Read>(
        mut reader: R,
        origin: &str,
        options: &LoadOptions,
    ) -> Result<Self, IngestError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes, origin, options)
    }

    /// Parses delimited text from an in-memory buffer.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the input is empty, has no header row, a
    /// line has more fields than the header, or the text is not valid CSV.
    pub fn from_bytes(
        bytes: &[u8],
        origin: &str,
        options: &LoadOptions,
    ) -> Result<Self, IngestError> {
        // ── Decompress if needed ────────────────────────────────────────
        let decompressed;
        let csv_bytes: &[u8] = if options.is_gzipped {
            let mut decoder = flate2::read::GzDecoder::new(bytes);
            let mut buf = Vec::new();
            decoder.read_to_end(&mut buf)?;
            log::debug!("Decompressed {origin} to {} bytes", buf.len());
            decompressed = buf;
            &decompressed
        } else {
            bytes
        };

        if csv_bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(IngestError::Empty {
                origin: origin.to_owned(),
            });
        }

        // ── Parse CSV ───────────────────────────────────────────────────
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(options.delimiter)
            .flexible(true)
            .from_reader(csv_bytes);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().trim_start_matches('\u{feff}').to_owned())
            .collect();

        if headers.iter().all(String::is_empty) {
            return Err(IngestError::NoHeader {
                origin: origin.to_owned(),
            });
        }

        let mut rows: Vec<Vec<String>> = Vec::new();

        for result in reader.records() {
            let record = result?;

            if record.len() > headers.len() {
                return Err(IngestError::RaggedRow {
                    origin: origin.to_owned(),
                    line: record.position().map_or(0, csv::Position::line),
                    expected: headers.len(),
                    found: record.len(),
                });
            }

            let row = (0..headers.len())
                .map(|i| record.get(i).unwrap_or("").trim().to_owned())
                .collect();
            rows.push(row);

            if let Some(max) = options.max_records
                && rows.len() as u64 >= max
            {
                log::info!("Reached max_records limit ({max}), stopping CSV parse");
                break;
            }
        }

        log::info!(
            "Parsed {} records with {} columns from {origin}",
            rows.len(),
            headers.len()
        );

        Ok(Self {
            origin: origin.to_owned(),
            headers,
            rows,
        })
    }

    /// Reads and parses a local file.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path, options: &LoadOptions) -> Result<Self, IngestError> {
        let bytes = std::fs::read(path)?;
        log::debug!("Read {} bytes from {}", bytes.len(), path.display());
        Self::from_bytes(&bytes, &path.display().to_string(), options)
    }

    /// Downloads and parses a remote file.
    ///
    /// A single request is made; there is no retry and no timeout beyond
    /// whatever the caller imposes.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the request fails, the server answers
    /// with an error status, or the body cannot be parsed.
    pub async fn fetch(url: &str, options: &LoadOptions) -> Result<Self, IngestError> {
        let client = reqwest::Client::builder().build()?;
        let response = client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        log::debug!("Downloaded {} bytes from {url}", bytes.len());

        Self::from_bytes(&bytes, url, options)
    }

    /// Where the data came from (path or URL).
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Header names in source order.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows, each as wide as the header row.
    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of data rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no data rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
