//! Diagnostic offset ledger.
//!
//! Every unit of sandboxed code is compiled as `PREAMBLE + source`. The
//! preamble pins the source encoding, and as a side effect shifts every line
//! number the verifier, the compiler and the interpreter see. Those components
//! report lines relative to the combined text; [`to_source_line`] is the only
//! place that maps them back, and [`PREAMBLE_LINES`] is derived from the
//! preamble text itself so the two can never drift apart.

/// Text prepended to every unit before verification and compilation.
pub const PREAMBLE: &str = "# -*- coding: utf-8 -*-\n";

/// Number of lines [`PREAMBLE`] contributes.
pub const PREAMBLE_LINES: usize = count_lines(PREAMBLE);

const fn count_lines(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut lines = 0;
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\n' {
            lines += 1;
        }
        i += 1;
    }
    lines
}

/// Normalize line endings and prepend the preamble.
pub fn prepare(source: &str) -> String {
    let normalized = source.replace("\r\n", "\n");
    let mut combined = String::with_capacity(PREAMBLE.len() + normalized.len());
    combined.push_str(PREAMBLE);
    combined.push_str(&normalized);
    combined
}

/// Map a 1-based line of the combined text to the author's numbering.
///
/// Lines inside the preamble have no source counterpart and map to `None`.
pub fn to_source_line(combined_line: usize) -> Option<usize> {
    combined_line
        .checked_sub(PREAMBLE_LINES)
        .filter(|line| *line >= 1)
}
