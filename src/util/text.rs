/// Renders a response body for log output, cut at `max_len` bytes on a char boundary.
pub(crate) fn body_snippet(body: &[u8], max_len: usize) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= max_len {
        return text.into_owned();
    }

    let mut cut = max_len;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }

    let mut out = text[..cut].to_string();
    out.push_str("...");
    out
}
