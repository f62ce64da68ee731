//! Conversion pipeline: source documents in, one XLSX artifact out.
//!
//! Single-file and multi-file conversion share one pipeline. A blank document
//! is fatal in single-file mode and a per-file skip in multi-file mode.

use tracing::{info, warn};

use crate::chunk::{process_lines_chunked, process_lines_chunked_async};
use crate::spec::{
    ConvertError, SpecConversionOutcome, SpecConvertOptions, SpecSheetRows,
    SpecSourceDocument, SpecSourceSkip, TypeRow,
};
use crate::util::{
    derive_output_file_name, inspect_row_structure, is_supported_source_name, sanitize_sheet_name,
    split_nonblank_lines,
};
use crate::writer::WorkbookAssembler;

/// Configured conversion engine.
///
/// Holds only immutable options; every call builds its own workbook, so one
/// converter can serve any number of conversions.
#[derive(Debug, Clone, Default)]
pub struct PipeConverter {
    options: SpecConvertOptions,
}

impl PipeConverter {
    /// Build a converter after validating `options`.
    pub fn new(options: SpecConvertOptions) -> Result<Self, ConvertError> {
        options.validate()?;
        Ok(Self { options })
    }

    /// Options this converter was built with.
    pub fn options(&self) -> &SpecConvertOptions {
        &self.options
    }

    /// Convert one document; the output name is derived from its file name.
    pub fn convert_single(
        &self,
        document: &SpecSourceDocument,
    ) -> Result<SpecConversionOutcome, ConvertError> {
        let file_name = derive_output_file_name(&document.name, &self.options.sheet_name_policy);
        let mut assembler = WorkbookAssembler::new(self.options.encode_options.clone());

        let l_lines = self
            .prepare_lines(document, &mut assembler)
            .map_err(|skip| ConvertError::EmptyInput {
                source_name: skip.source_name,
            })?;
        let l_rows = process_lines_chunked(
            &l_lines,
            self.options.delimiter,
            &self.options.row_chunk_policy,
        );
        let sheet_rows = self.inspect_rows(document, l_rows, &mut assembler);
        self.commit_sheets(std::slice::from_ref(document), vec![Ok(sheet_rows)], &mut assembler);

        self.finish(assembler, file_name)
    }

    /// Convert many documents into one workbook, one sheet per document.
    ///
    /// Every document is processed before any sheet name is reserved.
    /// `output_file_name` falls back to the configured default.
    pub fn convert_multiple(
        &self,
        documents: &[SpecSourceDocument],
        output_file_name: Option<&str>,
    ) -> Result<SpecConversionOutcome, ConvertError> {
        if documents.is_empty() {
            return Err(ConvertError::NoInput);
        }
        let file_name = self.derive_multi_file_name(output_file_name);
        let mut assembler = WorkbookAssembler::new(self.options.encode_options.clone());

        let l_results: Vec<Result<SpecSheetRows, SpecSourceSkip>> = documents
            .iter()
            .map(|document| -> Result<SpecSheetRows, SpecSourceSkip> {
                let l_lines = self.prepare_lines(document, &mut assembler)?;
                let l_rows = process_lines_chunked(
                    &l_lines,
                    self.options.delimiter,
                    &self.options.row_chunk_policy,
                );
                Ok(self.inspect_rows(document, l_rows, &mut assembler))
            })
            .collect();
        self.commit_sheets(documents, l_results, &mut assembler);

        self.finish(assembler, file_name)
    }

    /// Async [`Self::convert_single`] that yields between row batches.
    pub async fn convert_single_async(
        &self,
        document: &SpecSourceDocument,
    ) -> Result<SpecConversionOutcome, ConvertError> {
        let file_name = derive_output_file_name(&document.name, &self.options.sheet_name_policy);
        let mut assembler = WorkbookAssembler::new(self.options.encode_options.clone());

        let l_lines = self
            .prepare_lines(document, &mut assembler)
            .map_err(|skip| ConvertError::EmptyInput {
                source_name: skip.source_name,
            })?;
        let l_rows = process_lines_chunked_async(
            &l_lines,
            self.options.delimiter,
            &self.options.row_chunk_policy,
        )
        .await;
        let sheet_rows = self.inspect_rows(document, l_rows, &mut assembler);
        self.commit_sheets(std::slice::from_ref(document), vec![Ok(sheet_rows)], &mut assembler);

        self.finish(assembler, file_name)
    }

    /// Async [`Self::convert_multiple`] that yields between row batches.
    pub async fn convert_multiple_async(
        &self,
        documents: &[SpecSourceDocument],
        output_file_name: Option<&str>,
    ) -> Result<SpecConversionOutcome, ConvertError> {
        if documents.is_empty() {
            return Err(ConvertError::NoInput);
        }
        let file_name = self.derive_multi_file_name(output_file_name);
        let mut assembler = WorkbookAssembler::new(self.options.encode_options.clone());

        let mut l_results: Vec<Result<SpecSheetRows, SpecSourceSkip>> =
            Vec::with_capacity(documents.len());
        for document in documents {
            let result = match self.prepare_lines(document, &mut assembler) {
                Ok(l_lines) => {
                    let l_rows = process_lines_chunked_async(
                        &l_lines,
                        self.options.delimiter,
                        &self.options.row_chunk_policy,
                    )
                    .await;
                    Ok(self.inspect_rows(document, l_rows, &mut assembler))
                }
                Err(skip) => Err(skip),
            };
            l_results.push(result);
        }
        self.commit_sheets(documents, l_results, &mut assembler);

        self.finish(assembler, file_name)
    }

    fn derive_multi_file_name(&self, output_file_name: Option<&str>) -> String {
        output_file_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.options.output_file_name_default)
            .to_string()
    }

    /// Tokenize one document; a blank document comes back as a skip.
    fn prepare_lines<'a>(
        &self,
        document: &'a SpecSourceDocument,
        assembler: &mut WorkbookAssembler,
    ) -> Result<Vec<&'a str>, SpecSourceSkip> {
        if !is_supported_source_name(
            &document.name,
            &self.options.sheet_name_policy.source_extensions,
        ) {
            warn!(source = %document.name, "unrecognized source extension");
            assembler.report_mut().warn(format!(
                "{:?}: unrecognized extension; converting as delimited text.",
                document.name
            ));
        }

        let l_lines = split_nonblank_lines(&document.raw_text);
        if l_lines.is_empty() {
            let err = ConvertError::EmptyInput {
                source_name: document.name.clone(),
            };
            return Err(SpecSourceSkip {
                source_name: document.name.clone(),
                reason: err.to_string(),
            });
        }
        Ok(l_lines)
    }

    /// Record structure warnings for one document's rows.
    fn inspect_rows(
        &self,
        document: &SpecSourceDocument,
        l_rows: Vec<TypeRow>,
        assembler: &mut WorkbookAssembler,
    ) -> SpecSheetRows {
        let report = assembler.report_mut();
        let n_warnings_before = report.warnings.len();
        inspect_row_structure(
            &document.name,
            document.raw_text.len(),
            &l_rows,
            &self.options.structure_policy,
            report,
        );
        for c_warning in &report.warnings[n_warnings_before..] {
            warn!(source = %document.name, "{c_warning}");
        }
        SpecSheetRows {
            source_name: document.name.clone(),
            rows: l_rows,
        }
    }

    /// Reserve sheet names in submission order, one result per document.
    fn commit_sheets(
        &self,
        documents: &[SpecSourceDocument],
        l_results: Vec<Result<SpecSheetRows, SpecSourceSkip>>,
        assembler: &mut WorkbookAssembler,
    ) {
        for (document, result) in documents.iter().zip(l_results) {
            let sheet_name_candidate =
                sanitize_sheet_name(&document.name, &self.options.sheet_name_policy);
            assembler.commit(result, &sheet_name_candidate);
        }
    }

    fn finish(
        &self,
        assembler: WorkbookAssembler,
        file_name: String,
    ) -> Result<SpecConversionOutcome, ConvertError> {
        let outcome = assembler.finish(file_name)?;
        info!("{}", outcome.report);
        Ok(outcome)
    }
}

/// Convert one document with default options.
pub fn convert_document(
    document: &SpecSourceDocument,
) -> Result<SpecConversionOutcome, ConvertError> {
    PipeConverter::default().convert_single(document)
}

/// Convert many documents into one workbook with default options.
pub fn convert_documents(
    documents: &[SpecSourceDocument],
    output_file_name: Option<&str>,
) -> Result<SpecConversionOutcome, ConvertError> {
    PipeConverter::default().convert_multiple(documents, output_file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, raw_text: &str) -> SpecSourceDocument {
        SpecSourceDocument::new(name, raw_text)
    }

    #[test]
    fn test_convert_single_names_sheet_and_file() {
        let outcome = convert_document(&doc("Lab_Results_Audit.txt", "A|B|C\n1|2|3\n"))
            .expect("conversion should succeed");

        assert_eq!(outcome.artifact.file_name, "Lab_Results.xlsx");
        assert_eq!(outcome.report.sheet_names(), vec!["Lab_Audit"]);
        assert_eq!(outcome.report.sheets[0].n_rows, 2);
        assert_eq!(outcome.report.sheets[0].n_cols_max, 3);
    }

    #[test]
    fn test_convert_single_blank_is_empty_input() {
        let err = convert_document(&doc("blank.txt", "  \r\n\n\t")).unwrap_err();
        assert_eq!(
            err,
            ConvertError::EmptyInput {
                source_name: "blank.txt".to_string()
            }
        );
    }

    #[test]
    fn test_convert_multiple_no_input() {
        assert_eq!(
            convert_documents(&[], Some("x.xlsx")).unwrap_err(),
            ConvertError::NoInput
        );
    }

    #[test]
    fn test_convert_multiple_all_blank_is_no_valid_data() {
        let docs = vec![doc("a.txt", ""), doc("b.txt", " \n ")];
        assert_eq!(
            convert_documents(&docs, None).unwrap_err(),
            ConvertError::NoValidData
        );
    }

    #[test]
    fn test_convert_multiple_skips_blank_and_resolves_collisions() {
        let docs = vec![
            doc("service_2024.txt", "a|b"),
            doc("empty_emr.txt", "\n\n"),
            doc("emr_extra.txt", "c|d"),
            doc("notes.dat", "e"),
        ];
        let outcome = convert_documents(&docs, Some("  ")).expect("conversion should succeed");

        assert_eq!(outcome.artifact.file_name, "Pipe2Excel_Output.xlsx");
        assert_eq!(outcome.report.sheet_names(), vec!["EMR", "EMR_1", "notes.dat"]);
        assert_eq!(outcome.report.skips.len(), 1);
        assert_eq!(outcome.report.skips[0].source_name, "empty_emr.txt");
        assert!(
            outcome
                .report
                .warnings
                .iter()
                .any(|w| w.contains("unrecognized extension"))
        );
    }

    #[test]
    fn test_convert_byte_order_mark_only_is_blank() {
        let err = convert_document(&doc("bom.txt", "\u{FEFF}\r\n  \n")).unwrap_err();
        assert_eq!(
            err,
            ConvertError::EmptyInput {
                source_name: "bom.txt".to_string()
            }
        );

        let docs = vec![doc("bom.txt", "\u{FEFF}\n"), doc("lab.txt", "\u{FEFF}id|v\n1|2")];
        let outcome = convert_documents(&docs, None).expect("conversion should succeed");
        assert_eq!(outcome.report.sheet_names(), vec!["Lab"]);
        assert_eq!(outcome.report.skips.len(), 1);
        assert_eq!(outcome.report.skips[0].source_name, "bom.txt");
        assert_eq!(outcome.report.sheets[0].n_cols_max, 2);
    }

    #[test]
    fn test_convert_multiple_commits_after_all_sources_are_processed() {
        let docs = vec![
            doc("blank.txt", "\n"),
            doc("notes.dat", "e"),
            doc("emr.txt", "a"),
            doc("emr.txt", "b"),
        ];
        let outcome = convert_documents(&docs, None).expect("conversion should succeed");

        assert_eq!(outcome.report.sheet_names(), vec!["notes.dat", "EMR", "EMR_1"]);
        assert_eq!(outcome.report.warnings.len(), 2);
        assert!(outcome.report.warnings[0].contains("unrecognized extension"));
        assert!(outcome.report.warnings[1].starts_with("\"blank.txt\" skipped"));
    }

    #[test]
    fn test_convert_too_many_columns_warns_then_fails_encoding() {
        let c_row = vec!["x"; crate::conf::N_NCOLS_EXCEL_MAX + 1].join("|");
        let mut assembler = WorkbookAssembler::new(Default::default());
        let document = doc("wide.txt", &c_row);
        let converter = PipeConverter::default();
        let l_lines = converter
            .prepare_lines(&document, &mut assembler)
            .expect("one line");
        let l_rows = process_lines_chunked(&l_lines, '|', &Default::default());
        converter.inspect_rows(&document, l_rows, &mut assembler);
        assert!(
            assembler
                .report_mut()
                .warnings
                .iter()
                .any(|w| w.contains("16385 columns exceed the Excel limit"))
        );

        assert!(matches!(
            convert_document(&document),
            Err(ConvertError::Encoding(_))
        ));
    }

    #[test]
    fn test_convert_long_cell_warns_then_fails_encoding() {
        let c_text = format!("id|{}", "y".repeat(crate::conf::N_LEN_EXCEL_CELL_TEXT_MAX + 1));
        let mut assembler = WorkbookAssembler::new(Default::default());
        let document = doc("notes.txt", &c_text);
        let converter = PipeConverter::default();
        let l_lines = converter
            .prepare_lines(&document, &mut assembler)
            .expect("one line");
        let l_rows = process_lines_chunked(&l_lines, '|', &Default::default());
        converter.inspect_rows(&document, l_rows, &mut assembler);
        assert!(
            assembler
                .report_mut()
                .warnings
                .iter()
                .any(|w| w.contains("row 1, column 2 has 32768 characters"))
        );

        let docs = vec![doc("ok.txt", "a"), document];
        assert!(matches!(
            convert_documents(&docs, None),
            Err(ConvertError::Encoding(_))
        ));
    }

    #[test]
    fn test_new_rejects_invalid_options() {
        let mut options = SpecConvertOptions::default();
        options.row_chunk_policy.n_chunks_per_yield = 0;
        assert!(matches!(
            PipeConverter::new(options),
            Err(ConvertError::InvalidOptions(_))
        ));
    }

    #[tokio::test]
    async fn test_async_matches_sync_report() {
        let converter = PipeConverter::new(SpecConvertOptions {
            row_chunk_policy: crate::spec::SpecRowChunkPolicy {
                size_rows_chunk: 2,
                n_chunks_per_yield: 1,
            },
            ..Default::default()
        })
        .expect("options are valid");
        let docs = vec![
            doc("lab.txt", "1|2\n3|4\n5|6\n7|8\n9"),
            doc("lab.txt", "x"),
        ];

        let outcome_sync = converter
            .convert_multiple(&docs, Some("out.xlsx"))
            .expect("sync conversion should succeed");
        let outcome_async = converter
            .convert_multiple_async(&docs, Some("out.xlsx"))
            .await
            .expect("async conversion should succeed");

        assert_eq!(outcome_sync.report, outcome_async.report);
        assert_eq!(outcome_async.report.sheet_names(), vec!["Lab", "Lab_1"]);

        let err = converter
            .convert_single_async(&doc("x.txt", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ConvertError::EmptyInput { .. }));
    }
}
