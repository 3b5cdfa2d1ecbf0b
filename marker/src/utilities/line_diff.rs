use similar::TextDiff;

/// Unified line diff of `expected` against `actual` under the given headers.
///
/// Returns an empty string when the texts are equal.
pub fn unified(expected: &str, actual: &str, expected_label: &str, actual_label: &str) -> String {
    if expected == actual {
        return String::new();
    }
    TextDiff::from_lines(expected, actual)
        .unified_diff()
        .context_radius(3)
        .header(expected_label, actual_label)
        .to_string()
}
