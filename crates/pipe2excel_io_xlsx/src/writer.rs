//! Workbook assembler and XLSX encoder.

use std::collections::BTreeSet;

use rust_xlsxwriter::{Workbook, Worksheet, XlsxError};
use tracing::{debug, info, warn};

use crate::conf::C_EXCEL_SHEET_NAME_RESERVED;
use crate::spec::{
    ConvertError, SpecConversionArtifact, SpecConversionOutcome, SpecConvertReport,
    SpecEncodeOptions, SpecSheetData, SpecSheetRows, SpecSheetSummary, SpecSourceSkip, TypeRow,
};
use crate::util::create_sheet_identifier;

/// Stateful per-conversion workbook.
///
/// Owns the committed sheets and the set of names already taken. Names are
/// compared case-insensitively, as Excel does.
pub struct WorkbookAssembler {
    l_sheets: Vec<SpecSheetData>,
    set_sheet_names_existing: BTreeSet<String>,
    report: SpecConvertReport,
    encode_options: SpecEncodeOptions,
}

impl WorkbookAssembler {
    /// Create an empty workbook.
    pub fn new(encode_options: SpecEncodeOptions) -> Self {
        let mut set_sheet_names_existing = BTreeSet::new();
        set_sheet_names_existing.insert(C_EXCEL_SHEET_NAME_RESERVED.to_lowercase());
        Self {
            l_sheets: Vec::new(),
            set_sheet_names_existing,
            report: SpecConvertReport::default(),
            encode_options,
        }
    }

    /// Committed sheets in submission order.
    pub fn sheets(&self) -> &[SpecSheetData] {
        &self.l_sheets
    }

    /// Number of committed sheets.
    pub fn sheet_count(&self) -> usize {
        self.l_sheets.len()
    }

    /// Mutable access to the report, for pipeline-level warnings.
    pub fn report_mut(&mut self) -> &mut SpecConvertReport {
        &mut self.report
    }

    /// Commit one per-source result.
    ///
    /// Skips (and sources with zero rows) are recorded and reserve no name.
    /// Returns the final sheet name when a sheet was created.
    pub fn commit(
        &mut self,
        result: Result<SpecSheetRows, SpecSourceSkip>,
        sheet_name_candidate: &str,
    ) -> Option<&str> {
        let sheet_rows = match result {
            Ok(val) if !val.rows.is_empty() => val,
            Ok(val) => {
                self.skip_source(SpecSourceSkip {
                    source_name: val.source_name,
                    reason: "no rows".to_string(),
                });
                return None;
            }
            Err(skip) => {
                self.skip_source(skip);
                return None;
            }
        };

        let sheet_name_unique = self.derive_unique_sheet_name(sheet_name_candidate);
        if sheet_name_unique != sheet_name_candidate {
            debug!(
                candidate = sheet_name_candidate,
                resolved = %sheet_name_unique,
                "sheet name collision resolved"
            );
        }

        self.report.sheets.push(SpecSheetSummary {
            source_name: sheet_rows.source_name.clone(),
            sheet_name: sheet_name_unique.clone(),
            n_rows: sheet_rows.rows.len(),
            n_cols_max: sheet_rows.width_max(),
        });
        self.l_sheets.push(SpecSheetData {
            sheet_name: sheet_name_unique,
            source_name: sheet_rows.source_name,
            rows: sheet_rows.rows,
        });

        self.l_sheets.last().map(|sheet| sheet.sheet_name.as_str())
    }

    /// Record a skipped source with a warning.
    pub fn skip_source(&mut self, skip: SpecSourceSkip) {
        warn!(source = %skip.source_name, reason = %skip.reason, "source skipped");
        self.report
            .warn(format!("{:?} skipped: {}", skip.source_name, skip.reason));
        self.report.skips.push(skip);
    }

    /// Reserve and return a workbook-unique name for `name`.
    ///
    /// On collision, `_1`, `_2`, ... is appended to a prefix of `name` short
    /// enough that the result stays within 31 chars.
    pub fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if self.set_sheet_names_existing.insert(name.to_lowercase()) {
            return name.to_string();
        }

        let mut n_idx = 1usize;
        loop {
            let candidate = create_sheet_identifier(name, n_idx);
            if self.set_sheet_names_existing.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n_idx += 1;
        }
    }

    /// Encode the workbook and hand it over as an artifact.
    ///
    /// Fails with [`ConvertError::NoValidData`] if no sheet was committed.
    pub fn finish(self, file_name: String) -> Result<SpecConversionOutcome, ConvertError> {
        if self.l_sheets.is_empty() {
            return Err(ConvertError::NoValidData);
        }

        let binary_payload = encode_workbook(&self.l_sheets, &self.encode_options)?;
        info!(
            file_name = %file_name,
            sheets = self.l_sheets.len(),
            bytes = binary_payload.len(),
            "workbook encoded"
        );

        Ok(SpecConversionOutcome {
            artifact: SpecConversionArtifact {
                file_name,
                binary_payload,
            },
            report: self.report,
        })
    }
}

/// Serialize sheets into XLSX bytes, one worksheet per sheet in order.
///
/// Every cell is written as plain text without a cell format; empty cells are
/// left unwritten.
pub fn encode_workbook(
    sheets: &[SpecSheetData],
    options: &SpecEncodeOptions,
) -> Result<Vec<u8>, ConvertError> {
    let mut workbook = Workbook::new();

    for sheet in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&sheet.sheet_name)
            .map_err(derive_encoding_error)?;
        write_rows(worksheet, &sheet.rows)?;
        if options.if_autofit_columns {
            apply_column_widths(worksheet, &sheet.rows, options)?;
        }
    }

    workbook.save_to_buffer().map_err(derive_encoding_error)
}

fn write_rows(worksheet: &mut Worksheet, rows: &[TypeRow]) -> Result<(), ConvertError> {
    for (row_idx, row_values) in rows.iter().enumerate() {
        let n_row = cast_row_num(row_idx)?;
        for (col_idx, cell_value) in row_values.iter().enumerate() {
            if cell_value.is_empty() {
                continue;
            }
            worksheet
                .write_string(n_row, cast_col_num(col_idx)?, cell_value)
                .map_err(derive_encoding_error)?;
        }
    }
    Ok(())
}

fn apply_column_widths(
    worksheet: &mut Worksheet,
    rows: &[TypeRow],
    options: &SpecEncodeOptions,
) -> Result<(), ConvertError> {
    let n_rows_inspected = options
        .height_body_inferred_max
        .map_or(rows.len(), |n_max| usize::min(rows.len(), n_max));

    let mut l_width_by_col: Vec<usize> = Vec::new();
    for row in &rows[..n_rows_inspected] {
        if l_width_by_col.len() < row.len() {
            l_width_by_col.resize(row.len(), 0);
        }
        for (n_idx_col, value) in row.iter().enumerate() {
            l_width_by_col[n_idx_col] =
                usize::max(l_width_by_col[n_idx_col], estimate_unicode_string_width(value));
        }
    }

    let n_min = usize::max(1, options.width_cell_min);
    let n_max = usize::min(255, usize::max(n_min, options.width_cell_max));
    for (n_idx_col, n_width_recorded) in l_width_by_col.into_iter().enumerate() {
        let n_width_final = usize::min(n_max, usize::max(n_min, n_width_recorded + 2));
        worksheet
            .set_column_width(cast_col_num(n_idx_col)?, n_width_final as f64)
            .map_err(derive_encoding_error)?;
    }
    Ok(())
}

/// Estimate displayed width units; wide (non-ASCII) chars count 1.6.
pub fn estimate_unicode_string_width(s: &str) -> usize {
    let n_ascii = s.chars().filter(|chr| chr.is_ascii()).count();
    let n_non_ascii = s.chars().count().saturating_sub(n_ascii);
    n_ascii + (n_non_ascii as f64 * 1.6).round() as usize
}

fn cast_row_num(value: usize) -> Result<u32, ConvertError> {
    u32::try_from(value).map_err(|_| ConvertError::Encoding(format!("row index overflow: {value}")))
}

fn cast_col_num(value: usize) -> Result<u16, ConvertError> {
    u16::try_from(value)
        .map_err(|_| ConvertError::Encoding(format!("column index overflow: {value}")))
}

fn derive_encoding_error(err: XlsxError) -> ConvertError {
    ConvertError::Encoding(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(source_name: &str, l_lines: &[&[&str]]) -> SpecSheetRows {
        SpecSheetRows {
            source_name: source_name.to_string(),
            rows: l_lines
                .iter()
                .map(|row| row.iter().map(|cell| cell.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn test_derive_unique_sheet_name_suffixes_collisions() {
        let mut assembler = WorkbookAssembler::new(SpecEncodeOptions::default());
        assert_eq!(assembler.derive_unique_sheet_name("EMR"), "EMR");
        assert_eq!(assembler.derive_unique_sheet_name("EMR"), "EMR_1");
        assert_eq!(assembler.derive_unique_sheet_name("emr"), "emr_2");
        assert_eq!(assembler.derive_unique_sheet_name("EMR_1"), "EMR_1_1");
        assert_eq!(assembler.derive_unique_sheet_name("History"), "History_1");
    }

    #[test]
    fn test_derive_unique_sheet_name_long_base_stays_within_limit() {
        let mut assembler = WorkbookAssembler::new(SpecEncodeOptions::default());
        let c_base = "y".repeat(31);
        let mut set_seen = BTreeSet::new();
        for _ in 0..15 {
            let c_name = assembler.derive_unique_sheet_name(&c_base);
            assert!(c_name.chars().count() <= 31);
            assert!(set_seen.insert(c_name));
        }
        assert!(set_seen.contains(&format!("{}_10", "y".repeat(28))));
    }

    #[test]
    fn test_commit_skips_empty_without_reserving_name() {
        let mut assembler = WorkbookAssembler::new(SpecEncodeOptions::default());
        assert_eq!(assembler.commit(Ok(rows("a.txt", &[])), "EMR"), None);
        assert_eq!(
            assembler.commit(
                Err(SpecSourceSkip {
                    source_name: "b.txt".to_string(),
                    reason: "empty".to_string(),
                }),
                "EMR",
            ),
            None
        );
        assert_eq!(
            assembler.commit(Ok(rows("c.txt", &[&["x"]])), "EMR"),
            Some("EMR")
        );

        assert_eq!(assembler.sheet_count(), 1);
        let report = &assembler.report;
        assert_eq!(report.skips.len(), 2);
        assert_eq!(report.warnings.len(), 2);
        assert_eq!(report.sheet_names(), vec!["EMR"]);
    }

    #[test]
    fn test_finish_without_sheets_is_no_valid_data() {
        let assembler = WorkbookAssembler::new(SpecEncodeOptions::default());
        assert_eq!(
            assembler.finish("out.xlsx".to_string()).err(),
            Some(ConvertError::NoValidData)
        );
    }

    #[test]
    fn test_finish_produces_zip_container() {
        let mut assembler = WorkbookAssembler::new(SpecEncodeOptions {
            if_autofit_columns: true,
            ..Default::default()
        });
        assembler.commit(Ok(rows("a.txt", &[&["A", "B"], &["1", ""]])), "a");
        assembler.commit(Ok(rows("b.txt", &[&["only"]])), "a");

        let outcome = assembler
            .finish("out.xlsx".to_string())
            .expect("encode should succeed");
        assert_eq!(outcome.artifact.file_name, "out.xlsx");
        assert!(outcome.artifact.binary_payload.starts_with(b"PK"));
        assert_eq!(outcome.report.sheet_names(), vec!["a", "a_1"]);
        assert_eq!(outcome.report.sheets[0].n_cols_max, 2);
    }

    #[test]
    fn test_encode_surfaces_writer_fault_as_encoding_error() {
        let sheets = vec![SpecSheetData {
            sheet_name: "bad".to_string(),
            source_name: "bad.txt".to_string(),
            rows: vec![vec!["x".repeat(40_000)]],
        }];
        assert!(matches!(
            encode_workbook(&sheets, &SpecEncodeOptions::default()),
            Err(ConvertError::Encoding(_))
        ));
    }

    #[test]
    fn test_estimate_unicode_string_width() {
        assert_eq!(estimate_unicode_string_width("abc"), 3);
        assert_eq!(estimate_unicode_string_width("日本"), 3);
    }
}
