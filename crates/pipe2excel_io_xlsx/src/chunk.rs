//! Chunked line-to-row processing.
//!
//! Lines are split in fixed-size batches. The async variant yields to the
//! scheduler every `n_chunks_per_yield` batches; the sync variant is the same
//! loop without suspension points. Both produce exactly the rows a single
//! unchunked pass would.

use tracing::debug;

use crate::spec::{SpecRowChunkPolicy, TypeRow};
use crate::util::{generate_row_chunks, split_row_cells};

fn split_row_chunk(lines: &[&str], delimiter: char, rows: &mut Vec<TypeRow>) {
    rows.extend(lines.iter().map(|line| split_row_cells(line, delimiter)));
}

/// Split all `lines` into rows, one batch at a time.
pub fn process_lines_chunked(
    lines: &[&str],
    delimiter: char,
    policy: &SpecRowChunkPolicy,
) -> Vec<TypeRow> {
    let mut l_rows = Vec::with_capacity(lines.len());
    let l_row_chunks = generate_row_chunks(lines.len(), usize::max(1, policy.size_rows_chunk));
    let n_chunks_total = l_row_chunks.len();

    for (n_idx_chunk, (n_row_start, n_rows_len)) in l_row_chunks.into_iter().enumerate() {
        split_row_chunk(
            &lines[n_row_start..n_row_start + n_rows_len],
            delimiter,
            &mut l_rows,
        );
        debug!(
            chunk = n_idx_chunk + 1,
            chunks = n_chunks_total,
            rows = l_rows.len(),
            "row chunk processed"
        );
    }

    l_rows
}

/// Async variant of [`process_lines_chunked`] with cooperative yields.
pub async fn process_lines_chunked_async(
    lines: &[&str],
    delimiter: char,
    policy: &SpecRowChunkPolicy,
) -> Vec<TypeRow> {
    let mut l_rows = Vec::with_capacity(lines.len());
    let l_row_chunks = generate_row_chunks(lines.len(), usize::max(1, policy.size_rows_chunk));
    let n_chunks_total = l_row_chunks.len();
    let n_chunks_per_yield = usize::max(1, policy.n_chunks_per_yield);

    for (n_idx_chunk, (n_row_start, n_rows_len)) in l_row_chunks.into_iter().enumerate() {
        split_row_chunk(
            &lines[n_row_start..n_row_start + n_rows_len],
            delimiter,
            &mut l_rows,
        );
        debug!(
            chunk = n_idx_chunk + 1,
            chunks = n_chunks_total,
            rows = l_rows.len(),
            "row chunk processed"
        );

        let n_chunks_done = n_idx_chunk + 1;
        if n_chunks_done < n_chunks_total && n_chunks_done % n_chunks_per_yield == 0 {
            tokio::task::yield_now().await;
        }
    }

    l_rows
}
