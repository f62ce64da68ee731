//! Shared conversion specification models, options, reports and errors.

use std::fmt;

use thiserror::Error;

use crate::conf::{
    C_DELIMITER_DEFAULT, C_MIME_XLSX, C_OUTPUT_FILE_NAME_MULTI_DEFAULT, C_SHEET_MARKER_AUDIT,
    C_SHEET_SUFFIX_AUDIT, N_LEN_SHEET_LABEL_BASE_MAX, TUP_SOURCE_EXTENSIONS,
    derive_default_sheet_label_rules,
};

/// One parsed row: ordered cell texts, arity not enforced.
pub type TypeRow = Vec<String>;

////////////////////////////////////////////////////////////////////////////////
// #region SourceAndArtifactModels

/// One delimited text document supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSourceDocument {
    /// Original file name, used for sheet and output naming.
    pub name: String,
    /// Full decoded text content.
    pub raw_text: String,
}

impl SpecSourceDocument {
    pub fn new(name: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// Parsed rows of one source, before a sheet name is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetRows {
    /// Source file name the rows came from.
    pub source_name: String,
    /// Rows in source line order.
    pub rows: Vec<TypeRow>,
}

impl SpecSheetRows {
    /// Widest row length.
    pub fn width_max(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Rows placed under a resolved, workbook-unique sheet name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetData {
    /// Final sheet name.
    pub sheet_name: String,
    /// Source file name.
    pub source_name: String,
    /// Rows in source line order.
    pub rows: Vec<TypeRow>,
}

/// Source that produced no sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSourceSkip {
    /// Skipped source file name.
    pub source_name: String,
    /// Human-readable reason.
    pub reason: String,
}

/// Finished XLSX document plus its suggested file name.
#[derive(Clone, PartialEq, Eq)]
pub struct SpecConversionArtifact {
    /// Suggested download file name.
    pub file_name: String,
    /// Encoded XLSX bytes.
    pub binary_payload: Vec<u8>,
}

impl SpecConversionArtifact {
    /// MIME type of [`Self::binary_payload`].
    pub fn mime_type(&self) -> &'static str {
        C_MIME_XLSX
    }

    /// Consume the artifact and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.binary_payload
    }
}

impl fmt::Debug for SpecConversionArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecConversionArtifact")
            .field("file_name", &self.file_name)
            .field("len_binary_payload", &self.binary_payload.len())
            .finish()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ConvertOptions

/// Batch sizing for the chunked row processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecRowChunkPolicy {
    /// Lines split per batch.
    pub size_rows_chunk: usize,
    /// Batches processed between two cooperative yields (async path only).
    pub n_chunks_per_yield: usize,
}

impl Default for SpecRowChunkPolicy {
    fn default() -> Self {
        Self {
            size_rows_chunk: 5_000,
            n_chunks_per_yield: 1,
        }
    }
}

/// Advisory structure check thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecStructurePolicy {
    /// Sources at least this many bytes long get their column counts sampled.
    pub size_bytes_inspect_min: usize,
    /// Leading rows sampled for column-count consistency.
    pub height_sample_max: usize,
}

impl Default for SpecStructurePolicy {
    fn default() -> Self {
        Self {
            size_bytes_inspect_min: 1_048_576,
            height_sample_max: 100,
        }
    }
}

/// Maps file-name markers to a fixed sheet label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetLabelRule {
    /// Lowercase substrings; any match selects [`Self::label`].
    pub markers: Vec<String>,
    /// Label used when a marker matches.
    pub label: String,
}

/// Sheet name derivation policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetNamePolicy {
    /// Ordered label rules; first match wins.
    pub rules_label: Vec<SpecSheetLabelRule>,
    /// Lowercase marker that triggers [`Self::suffix_audit`].
    pub marker_audit: String,
    /// Suffix appended for audit files.
    pub suffix_audit: String,
    /// Max chars kept from the bare file name when no rule matches.
    pub len_label_base_max: usize,
    /// Known source extensions (lowercase, no dot).
    pub source_extensions: Vec<String>,
}

impl Default for SpecSheetNamePolicy {
    fn default() -> Self {
        Self {
            rules_label: derive_default_sheet_label_rules(),
            marker_audit: C_SHEET_MARKER_AUDIT.to_string(),
            suffix_audit: C_SHEET_SUFFIX_AUDIT.to_string(),
            len_label_base_max: N_LEN_SHEET_LABEL_BASE_MAX,
            source_extensions: TUP_SOURCE_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Encoder options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecEncodeOptions {
    /// Set column widths from sampled cell text.
    pub if_autofit_columns: bool,
    /// Max rows inspected for width inference.
    pub height_body_inferred_max: Option<usize>,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
}

impl Default for SpecEncodeOptions {
    fn default() -> Self {
        Self {
            if_autofit_columns: false,
            height_body_inferred_max: Some(1_000),
            width_cell_min: 8,
            width_cell_max: 60,
        }
    }
}

/// Engine-wide options, fixed when a converter is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecConvertOptions {
    /// Cell delimiter.
    pub delimiter: char,
    /// Multi-file output name used when the caller passes none.
    pub output_file_name_default: String,
    /// Chunked processor sizing.
    pub row_chunk_policy: SpecRowChunkPolicy,
    /// Advisory structure check thresholds.
    pub structure_policy: SpecStructurePolicy,
    /// Sheet name derivation.
    pub sheet_name_policy: SpecSheetNamePolicy,
    /// Encoder behavior.
    pub encode_options: SpecEncodeOptions,
}

impl Default for SpecConvertOptions {
    fn default() -> Self {
        Self {
            delimiter: C_DELIMITER_DEFAULT,
            output_file_name_default: C_OUTPUT_FILE_NAME_MULTI_DEFAULT.to_string(),
            row_chunk_policy: SpecRowChunkPolicy::default(),
            structure_policy: SpecStructurePolicy::default(),
            sheet_name_policy: SpecSheetNamePolicy::default(),
            encode_options: SpecEncodeOptions::default(),
        }
    }
}

impl SpecConvertOptions {
    /// Return a copy using `delimiter`.
    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Reject option combinations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConvertError> {
        if matches!(self.delimiter, '\n' | '\r') {
            return Err(ConvertError::InvalidOptions(
                "delimiter must not be a line break.".to_string(),
            ));
        }
        if self.row_chunk_policy.size_rows_chunk == 0 {
            return Err(ConvertError::InvalidOptions(
                "row_chunk_policy.size_rows_chunk must be >= 1.".to_string(),
            ));
        }
        if self.row_chunk_policy.n_chunks_per_yield == 0 {
            return Err(ConvertError::InvalidOptions(
                "row_chunk_policy.n_chunks_per_yield must be >= 1.".to_string(),
            ));
        }
        if self.encode_options.width_cell_min == 0 {
            return Err(ConvertError::InvalidOptions(
                "encode_options.width_cell_min must be >= 1.".to_string(),
            ));
        }
        if self.encode_options.width_cell_max < self.encode_options.width_cell_min {
            return Err(ConvertError::InvalidOptions(
                "encode_options.width_cell_max must be >= encode_options.width_cell_min."
                    .to_string(),
            ));
        }
        Ok(())
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// One committed sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecSheetSummary {
    /// Source file name.
    pub source_name: String,
    /// Final sheet name.
    pub sheet_name: String,
    /// Row count.
    pub n_rows: usize,
    /// Widest row length.
    pub n_cols_max: usize,
}

/// Per-conversion report.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecConvertReport {
    /// Committed sheets in workbook order.
    pub sheets: Vec<SpecSheetSummary>,
    /// Sources that produced no sheet.
    pub skips: Vec<SpecSourceSkip>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecConvertReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }

    /// Final sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.sheet_name.as_str()).collect()
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        format!(
            "{prefix} sheets={} rows={} skipped={} warnings={}",
            self.sheets.len(),
            self.sheets.iter().map(|s| s.n_rows).sum::<usize>(),
            self.skips.len(),
            self.warnings.len()
        )
    }
}

impl fmt::Display for SpecConvertReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[XLSX]"))
    }
}

/// Successful conversion result.
#[derive(Debug, Clone)]
pub struct SpecConversionOutcome {
    /// Encoded document.
    pub artifact: SpecConversionArtifact,
    /// What happened along the way.
    pub report: SpecConvertReport,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Errors

/// Fatal conversion errors. No artifact is produced when one is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// Document has no content after trimming.
    #[error("File {source_name:?} is empty or contains only whitespace.")]
    EmptyInput {
        /// Offending source file name.
        source_name: String,
    },
    /// Every document in a batch was skipped.
    #[error("No valid data found in any of the provided files to create an Excel sheet.")]
    NoValidData,
    /// Caller supplied zero documents.
    #[error("No files provided for conversion.")]
    NoInput,
    /// XLSX serialization failed; message comes from the writer unchanged.
    #[error("{0}")]
    Encoding(String),
    /// Options rejected by [`SpecConvertOptions::validate`].
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
