//! `pipe2excel_io_xlsx` v1:
//! Delimited text to XLSX conversion kernel.
//!
//! Modules:
//! - `conf`    : constants and default presets
//! - `spec`    : models/options/reports/errors
//! - `util`    : pure helper functions (tokenizing, splitting, naming)
//! - `chunk`   : chunked row processor (sync and cooperative async)
//! - `writer`  : workbook assembler and XLSX encoder
//! - `convert` : single-file and multi-file pipelines
pub mod chunk;
pub mod conf;
pub mod convert;
pub mod spec;
pub mod util;
pub mod writer;

pub use chunk::{process_lines_chunked, process_lines_chunked_async};
pub use conf::{
    C_DELIMITER_DEFAULT, C_MIME_XLSX, N_LEN_EXCEL_CELL_TEXT_MAX, N_LEN_EXCEL_SHEET_NAME_MAX,
    N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
pub use convert::{PipeConverter, convert_document, convert_documents};
pub use spec::{
    ConvertError, SpecConversionArtifact, SpecConversionOutcome, SpecConvertOptions,
    SpecConvertReport, SpecEncodeOptions, SpecRowChunkPolicy, SpecSheetData,
    SpecSheetLabelRule, SpecSheetNamePolicy, SpecSheetRows, SpecSheetSummary,
    SpecSourceDocument, SpecSourceSkip, SpecStructurePolicy, TypeRow,
};
pub use util::{
    derive_output_file_name, sanitize_sheet_name, split_nonblank_lines, split_row_cells,
};
pub use writer::{WorkbookAssembler, encode_workbook};
