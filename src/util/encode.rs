fn is_unreserved(byte: u8) -> bool {
    matches!(byte, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~')
}

pub(crate) fn aws_percent_encode(input: &str) -> String {
    aws_percent_encode_impl(input, false)
}

pub(crate) fn aws_percent_encode_path(input: &str) -> String {
    aws_percent_encode_impl(input, true)
}

fn aws_percent_encode_impl(input: &str, preserve_slash: bool) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if is_unreserved(b) || (preserve_slash && b == b'/') {
            out.push(b as char);
            continue;
        }

        out.push('%');
        out.push(hex_upper(b >> 4));
        out.push(hex_upper(b & 0x0F));
    }
    out
}

fn hex_upper(nibble: u8) -> char {
    match nibble {
        0..=9 => (b'0' + nibble) as char,
        10..=15 => (b'A' + (nibble - 10)) as char,
        _ => '0',
    }
}

/// Serializes query parameters in the order given.
pub(crate) fn query_string(params: &[(String, String)]) -> String {
    let mut out = String::new();
    for (idx, (k, v)) in params.iter().enumerate() {
        if idx > 0 {
            out.push('&');
        }
        out.push_str(&aws_percent_encode(k));
        out.push('=');
        out.push_str(&aws_percent_encode(v));
    }
    out
}

/// Builds an object resource path (`/key`) with the key percent-encoded.
pub(crate) fn object_resource(key: &str) -> String {
    let key = key.strip_prefix('/').unwrap_or(key);
    format!("/{}", aws_percent_encode_path(key))
}
