//! Remote endpoint parsing (§6 External Interfaces, §8 S6): turns a
//! `-r`/`--remote` argument into `(scheme, host, port, path)`. Grounded in
//! the original implementation's `client.parse_remote` table (see
//! `examples/original_source/lib/bup/t/tclient.py::test_remote_parsing`)
//! rather than invented from scratch, since the exact shorthand forms
//! (bare `host:/path`, the `:/path` local shorthand, bracketed IPv6
//! literals) aren't derivable from the distilled spec text alone.

use crate::error::{Error, Result};

const SCHEMES: &[&str] = &["ssh", "bup", "file"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: String,
    pub host: Option<String>,
    pub port: Option<String>,
    pub path: Option<String>,
}

/// Parses a remote spec. Total over `&str`: every input either produces an
/// `Endpoint` or `Err(Error::BadSpec(_))`, never panics (§8 property 5).
pub fn parse(spec: &str) -> Result<Endpoint> {
    if let Some(rest) = spec.strip_prefix(':') {
        if !rest.starts_with('/') {
            return Err(bad(spec));
        }
        return Ok(Endpoint {
            scheme: "file".to_owned(),
            host: None,
            port: None,
            path: Some(rest.to_owned()),
        });
    }

    if let Some(idx) = spec.find("://") {
        let scheme = &spec[..idx];
        if !SCHEMES.contains(&scheme) {
            return Err(Error::BadSpec(format!("unsupported remote scheme: {}", scheme)));
        }
        let (host, port, path) = parse_authority(&spec[idx + 3..])?;
        return Ok(Endpoint {
            scheme: scheme.to_owned(),
            host,
            port,
            path,
        });
    }

    // Bare `host:/path` ssh shorthand (rsync-style), e.g. "192.168.1.1:/bup".
    if let Some(colon) = spec.find(':') {
        let (host, rest) = spec.split_at(colon);
        let rest = &rest[1..];
        if host.is_empty() || !rest.starts_with('/') {
            return Err(bad(spec));
        }
        return Ok(Endpoint {
            scheme: "ssh".to_owned(),
            host: Some(host.to_owned()),
            port: None,
            path: Some(rest.to_owned()),
        });
    }

    Err(bad(spec))
}

fn bad(spec: &str) -> Error {
    Error::BadSpec(format!("not a remote spec: {}", spec))
}

/// Parses `[host][:port][/path]` following the scheme's `//`. `host` may be
/// a bracketed IPv6 literal.
fn parse_authority(rest: &str) -> Result<(Option<String>, Option<String>, Option<String>)> {
    if rest.is_empty() || rest.starts_with('/') {
        return Ok((None, None, non_empty(rest)));
    }

    let (host, rest) = if let Some(stripped) = rest.strip_prefix('[') {
        let end = stripped.find(']').ok_or_else(|| bad(rest))?;
        (stripped[..end].to_owned(), &stripped[end + 1..])
    } else {
        let end = rest.find([':', '/']).unwrap_or(rest.len());
        (rest[..end].to_owned(), &rest[end..])
    };

    let (port, rest) = if let Some(stripped) = rest.strip_prefix(':') {
        let end = stripped.find('/').unwrap_or(stripped.len());
        (Some(stripped[..end].to_owned()), &stripped[end..])
    } else {
        (None, rest)
    };

    Ok((Some(host), port, non_empty(rest)))
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(scheme: &str, host: Option<&str>, port: Option<&str>, path: Option<&str>) -> Endpoint {
        Endpoint {
            scheme: scheme.to_owned(),
            host: host.map(str::to_owned),
            port: port.map(str::to_owned),
            path: path.map(str::to_owned),
        }
    }

    #[test]
    fn parses_the_full_endpoint_table() {
        let cases = [
            (":/bup", ep("file", None, None, Some("/bup"))),
            ("file:///bup", ep("file", None, None, Some("/bup"))),
            ("192.168.1.1:/bup", ep("ssh", Some("192.168.1.1"), None, Some("/bup"))),
            (
                "ssh://192.168.1.1:2222/bup",
                ep("ssh", Some("192.168.1.1"), Some("2222"), Some("/bup")),
            ),
            (
                "ssh://[ff:fe::1]:2222/bup",
                ep("ssh", Some("ff:fe::1"), Some("2222"), Some("/bup")),
            ),
            ("bup://foo.com:1950", ep("bup", Some("foo.com"), Some("1950"), None)),
            (
                "bup://foo.com:1950/bup",
                ep("bup", Some("foo.com"), Some("1950"), Some("/bup")),
            ),
            ("bup://[ff:fe::1]/bup", ep("bup", Some("ff:fe::1"), None, Some("/bup"))),
        ];
        for (spec, want) in cases {
            assert_eq!(parse(spec).unwrap(), want, "spec: {}", spec);
        }
    }

    #[test]
    fn unknown_scheme_is_rejected() {
        assert!(matches!(parse("http://asdf.com/bup"), Err(Error::BadSpec(_))));
    }

    #[test]
    fn garbage_input_is_rejected_not_panicked() {
        for s in ["", "just-a-word", ":", "ssh://[unterminated"] {
            assert!(parse(s).is_err(), "expected error for {:?}", s);
        }
    }
}
