//! Stateless helper utilities used by the conversion pipeline.

use crate::conf::{
    C_EXCEL_SHEET_NAME_RESERVED, C_OUTPUT_FILE_EXTENSION, C_OUTPUT_FILE_NAME_FALLBACK,
    C_SHEET_NAME_FALLBACK, N_LEN_EXCEL_CELL_TEXT_MAX, N_LEN_EXCEL_SHEET_NAME_MAX,
    N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX, TUP_EXCEL_ILLEGAL,
};
use crate::spec::{SpecConvertReport, SpecSheetNamePolicy, SpecStructurePolicy, TypeRow};

////////////////////////////////////////////////////////////////////////////////
// #region LineAndRowSplitting

/// Trim whitespace and byte-order marks (U+FEFF) from both ends.
pub fn trim_text(value: &str) -> &str {
    value.trim_matches(|chr: char| chr.is_whitespace() || chr == '\u{FEFF}')
}

/// Split raw text into trimmed, non-blank lines.
///
/// Handles both `\n` and `\r\n`; the `\r` goes away with the trim, as does a
/// leading byte-order mark.
pub fn split_nonblank_lines(raw_text: &str) -> Vec<&str> {
    raw_text
        .split('\n')
        .map(trim_text)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Split one line on every `delimiter` and trim each cell.
///
/// No quoting or escaping. Leading/trailing delimiters yield empty cells.
pub fn split_row_cells(line: &str, delimiter: char) -> TypeRow {
    line.split(delimiter)
        .map(|cell| trim_text(cell).to_string())
        .collect()
}

/// Record advisory warnings about row shape. Never rejects input.
pub fn inspect_row_structure(
    source_name: &str,
    n_bytes_source: usize,
    rows: &[TypeRow],
    policy: &SpecStructurePolicy,
    report: &mut SpecConvertReport,
) {
    if rows.len() > N_NROWS_EXCEL_MAX {
        report.warn(format!(
            "{source_name:?}: {} rows exceed the Excel limit of {N_NROWS_EXCEL_MAX}.",
            rows.len()
        ));
    }
    if let Some(n_width_max) = rows.iter().map(Vec::len).max()
        && n_width_max > N_NCOLS_EXCEL_MAX
    {
        report.warn(format!(
            "{source_name:?}: {n_width_max} columns exceed the Excel limit of {N_NCOLS_EXCEL_MAX}."
        ));
    }
    if let Some((n_row, n_col, n_len)) = find_cell_text_overflow(rows) {
        report.warn(format!(
            "{source_name:?}: cell at row {}, column {} has {n_len} characters, over the Excel limit of {N_LEN_EXCEL_CELL_TEXT_MAX}.",
            n_row + 1,
            n_col + 1
        ));
    }

    if n_bytes_source < policy.size_bytes_inspect_min {
        return;
    }

    let l_widths_sampled: Vec<usize> = rows
        .iter()
        .take(policy.height_sample_max)
        .map(Vec::len)
        .collect();
    let (Some(n_min), Some(n_max)) = (
        l_widths_sampled.iter().min(),
        l_widths_sampled.iter().max(),
    ) else {
        return;
    };
    if n_min != n_max {
        report.warn(format!(
            "{source_name:?}: inconsistent column counts in the first {} rows (min={n_min}, max={n_max}); input may be malformed.",
            l_widths_sampled.len()
        ));
    }
}

/// First cell whose text is longer than Excel allows, as `(row, col, chars)`.
fn find_cell_text_overflow(rows: &[TypeRow]) -> Option<(usize, usize, usize)> {
    rows.iter().enumerate().find_map(|(n_row, row)| {
        row.iter().enumerate().find_map(|(n_col, cell)| {
            // Byte length bounds char count from above.
            if cell.len() <= N_LEN_EXCEL_CELL_TEXT_MAX {
                return None;
            }
            let n_len = cell.chars().count();
            (n_len > N_LEN_EXCEL_CELL_TEXT_MAX).then_some((n_row, n_col, n_len))
        })
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RowChunking

/// Generate `(row_start, row_len)` chunks for `n_rows_total`.
pub fn generate_row_chunks(n_rows_total: usize, size_rows_chunk: usize) -> Vec<(usize, usize)> {
    let mut l_chunks = Vec::new();
    let mut n_row_cursor = 0;
    while n_row_cursor < n_rows_total {
        let n_rows_per_chunk = usize::min(size_rows_chunk, n_rows_total - n_row_cursor);
        l_chunks.push((n_row_cursor, n_rows_per_chunk));
        n_row_cursor += n_rows_per_chunk;
    }
    l_chunks
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FileNames

/// Keep at most `n_chars_max` leading chars.
pub fn truncate_chars(value: &str, n_chars_max: usize) -> String {
    value.chars().take(n_chars_max).collect()
}

fn split_source_extension<'a>(name: &'a str, extensions: &[String]) -> Option<(&'a str, &'a str)> {
    let (c_stem, c_ext) = name.rsplit_once('.')?;
    let c_ext_lower = c_ext.to_lowercase();
    if extensions.iter().any(|ext| *ext == c_ext_lower) {
        Some((c_stem, c_ext))
    } else {
        None
    }
}

/// Remove one known source extension (case-insensitive), if present.
pub fn strip_source_extension<'a>(name: &'a str, extensions: &[String]) -> &'a str {
    split_source_extension(name, extensions).map_or(name, |(c_stem, _)| c_stem)
}

/// Whether `name` carries one of the known source extensions.
pub fn is_supported_source_name(name: &str, extensions: &[String]) -> bool {
    split_source_extension(name, extensions).is_some()
}

/// Derive the single-file output name.
///
/// Strips a known extension and every literal `Audit` marker with the
/// underscores around it, then appends `.xlsx`.
pub fn derive_output_file_name(source_name: &str, policy: &SpecSheetNamePolicy) -> String {
    let c_stem = strip_source_extension(source_name.trim(), &policy.source_extensions);

    let l_parts: Vec<&str> = c_stem.split("Audit").collect();
    let n_parts = l_parts.len();
    let c_stem_clean = l_parts
        .iter()
        .enumerate()
        .map(|(n_idx, part)| {
            let mut c_part = *part;
            if n_idx > 0 {
                c_part = c_part.trim_start_matches('_');
            }
            if n_idx + 1 < n_parts {
                c_part = c_part.trim_end_matches('_');
            }
            c_part
        })
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_");

    let c_stem_clean = c_stem_clean.trim();
    if c_stem_clean.is_empty() {
        return C_OUTPUT_FILE_NAME_FALLBACK.to_string();
    }
    format!("{c_stem_clean}{C_OUTPUT_FILE_EXTENSION}")
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetNormalization

/// Derive the raw label (before character cleanup) for a source file name.
pub fn derive_sheet_label(name: &str, policy: &SpecSheetNamePolicy) -> String {
    let c_name_lower = name.to_lowercase();

    let mut c_label = match policy.rules_label.iter().find(|rule| {
        rule.markers
            .iter()
            .any(|marker| !marker.is_empty() && c_name_lower.contains(marker.as_str()))
    }) {
        Some(rule) => rule.label.clone(),
        None => truncate_chars(
            strip_source_extension(name, &policy.source_extensions),
            policy.len_label_base_max,
        ),
    };

    let if_is_audit =
        !policy.marker_audit.is_empty() && c_name_lower.contains(policy.marker_audit.as_str());
    if if_is_audit
        && !c_label
            .to_lowercase()
            .ends_with(policy.marker_audit.as_str())
    {
        let n_len_suffix = policy.suffix_audit.chars().count();
        if c_label.chars().count() + n_len_suffix > N_LEN_EXCEL_SHEET_NAME_MAX {
            c_label = truncate_chars(
                &c_label,
                N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(n_len_suffix),
            );
        }
        c_label.push_str(&policy.suffix_audit);
    }

    c_label
}

/// Derive a valid Excel sheet name candidate from a source file name.
///
/// The result is at most 31 chars, has none of `[ ] * / \ ? :`, does not
/// start or end with `'` and is never `History`. It is not yet unique.
pub fn sanitize_sheet_name(name: &str, policy: &SpecSheetNamePolicy) -> String {
    let c_label = derive_sheet_label(name, policy);

    let c_name: String = c_label
        .chars()
        .filter(|chr| !TUP_EXCEL_ILLEGAL.contains(chr))
        .collect();
    let c_name = truncate_chars(c_name.trim_matches('\''), N_LEN_EXCEL_SHEET_NAME_MAX);
    let c_name = c_name.trim_end_matches('\'');

    if c_name.trim().is_empty() {
        return C_SHEET_NAME_FALLBACK.to_string();
    }
    if c_name.eq_ignore_ascii_case(C_EXCEL_SHEET_NAME_RESERVED) {
        return create_sheet_identifier(c_name, 1);
    }
    c_name.to_string()
}

/// Create suffixed sheet name (`base_1`, `base_2`, ...), respecting length cap.
///
/// The base keeps `31 - len("_N")` chars so the suffix is never cut.
pub fn create_sheet_identifier(base_name: &str, part_idx_1based: usize) -> String {
    let c_sheet_name_suffix = format!("_{part_idx_1based}");
    let n_len_base_name_max = N_LEN_EXCEL_SHEET_NAME_MAX.saturating_sub(c_sheet_name_suffix.len());

    let c_sheet_name_base = truncate_chars(base_name, usize::max(1, n_len_base_name_max));

    format!("{c_sheet_name_base}{c_sheet_name_suffix}")
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
