//! Conversion constants and default preset factories.

use crate::spec::{SpecConvertOptions, SpecSheetLabelRule};

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel maximum characters in one cell.
pub const N_LEN_EXCEL_CELL_TEXT_MAX: usize = 32_767;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [char; 7] = ['*', ':', '?', '/', '\\', '[', ']'];
/// Sheet name Excel keeps for itself (compared case-insensitively).
pub const C_EXCEL_SHEET_NAME_RESERVED: &str = "History";

/// Sheet name used when sanitization leaves nothing behind.
pub const C_SHEET_NAME_FALLBACK: &str = "Sheet1";
/// Max length of a label derived from the bare file name.
pub const N_LEN_SHEET_LABEL_BASE_MAX: usize = 25;
/// Lowercase marker that triggers the audit suffix.
pub const C_SHEET_MARKER_AUDIT: &str = "audit";
/// Suffix appended to labels of audit files.
pub const C_SHEET_SUFFIX_AUDIT: &str = "_Audit";

/// Source file extensions recognized as delimited text (lowercase, no dot).
pub const TUP_SOURCE_EXTENSIONS: [&str; 3] = ["txt", "pipe", "psv"];
/// Default cell delimiter.
pub const C_DELIMITER_DEFAULT: char = '|';

/// Output name used when single-file derivation yields nothing.
pub const C_OUTPUT_FILE_NAME_FALLBACK: &str = "Output.xlsx";
/// Output name used in multi-file mode when the caller does not supply one.
pub const C_OUTPUT_FILE_NAME_MULTI_DEFAULT: &str = "Pipe2Excel_Output.xlsx";
/// Output file extension, including the dot.
pub const C_OUTPUT_FILE_EXTENSION: &str = ".xlsx";
/// MIME type of the produced artifact.
pub const C_MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Build default file-name label rules, checked in order.
///
/// The first rule whose marker occurs in the lowercased file name wins.
pub fn derive_default_sheet_label_rules() -> Vec<SpecSheetLabelRule> {
    vec![
        SpecSheetLabelRule {
            markers: vec!["service".to_string(), "emr".to_string()],
            label: "EMR".to_string(),
        },
        SpecSheetLabelRule {
            markers: vec!["lab".to_string()],
            label: "Lab".to_string(),
        },
    ]
}

/// Build default conversion options.
pub fn derive_default_convert_options() -> SpecConvertOptions {
    SpecConvertOptions::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_presets() {
        let options = derive_default_convert_options();
        assert_eq!(options.delimiter, C_DELIMITER_DEFAULT);
        assert_eq!(options.output_file_name_default, C_OUTPUT_FILE_NAME_MULTI_DEFAULT);
        assert_eq!(options.sheet_name_policy.rules_label.len(), 2);
        assert_eq!(options.sheet_name_policy.rules_label[0].label, "EMR");
        assert_eq!(
            options.sheet_name_policy.source_extensions,
            vec!["txt", "pipe", "psv"]
        );
    }
}
