/// Find the largest char boundary in `s` that is <= `max_bytes`.
/// Safe for slicing: `&s[..find_char_boundary(s, max_bytes)]` never panics.
pub fn find_char_boundary(s: &str, max_bytes: usize) -> usize {
    if max_bytes >= s.len() {
        return s.len();
    }
    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

/// Shorten `s` for a log line, marking the cut with an ellipsis.
pub fn preview(s: &str, max_bytes: usize) -> String {
    let flat = s.replace('\n', "\\n");
    let end = find_char_boundary(&flat, max_bytes);
    if end < flat.len() {
        format!("{}...", &flat[..end])
    } else {
        flat
    }
}

/// Number of the last line of `code`, counting from 1.
pub fn last_line(code: &str) -> usize {
    code.lines().count().max(1)
}
