use url::Url;

use crate::auth::AddressingStyle;

/// Joins two path fragments with exactly one slash at the seam.
pub(crate) fn join_path(base: &str, tail: &str) -> String {
    let base = base.trim_end_matches('/');
    let tail = tail.trim_start_matches('/');
    format!("{base}/{tail}")
}

/// `host[:port]`, omitting the port when it is 80 or 443.
pub(crate) fn authority(endpoint: &Url) -> String {
    let host = endpoint.host_str().unwrap_or_default();
    match endpoint.port() {
        Some(port) if port != 80 && port != 443 => format!("{host}:{port}"),
        _ => host.to_string(),
    }
}

/// Value of the Host header for a request against `bucket`.
pub(crate) fn host_header(
    endpoint: &Url,
    bucket: Option<&str>,
    addressing: AddressingStyle,
) -> String {
    let authority = authority(endpoint);
    match bucket {
        Some(bucket) if !addressing.is_path() => format!("{bucket}.{authority}"),
        _ => authority,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_collapses_the_seam() {
        assert_eq!(join_path("", "/hoge"), "/hoge");
        assert_eq!(join_path("", "/"), "/");
        assert_eq!(join_path("/bucket/", "/hoge"), "/bucket/hoge");
        assert_eq!(join_path("localhost:3000", "hoge/"), "localhost:3000/hoge/");
    }

    #[test]
    fn authority_drops_well_known_ports() {
        let url = Url::parse("http://localhost:3000").unwrap();
        assert_eq!(authority(&url), "localhost:3000");

        let url = Url::parse("http://localhost:443").unwrap();
        assert_eq!(authority(&url), "localhost");

        let url = Url::parse("https://s3.example.com").unwrap();
        assert_eq!(authority(&url), "s3.example.com");
    }

    #[test]
    fn host_header_follows_addressing() {
        let url = Url::parse("http://localhost:3000").unwrap();
        assert_eq!(
            host_header(&url, Some("b"), AddressingStyle::VirtualHosted),
            "b.localhost:3000"
        );
        assert_eq!(
            host_header(&url, Some("b"), AddressingStyle::Path),
            "localhost:3000"
        );
        assert_eq!(
            host_header(&url, None, AddressingStyle::VirtualHosted),
            "localhost:3000"
        );
    }
}
