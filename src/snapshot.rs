//! Replayable response snapshots.
//!
//! A [`Snapshot`] captures the full externally-observable outcome of one
//! computation: status, typed headers, cookies, and body bytes. It is built
//! incrementally by the recorder while the real handler runs, frozen when the
//! handler returns, and from then on only ever shared behind an `Arc` — once a
//! snapshot reaches the cache store nothing mutates it again.
//!
//! Snapshots are serde-compatible (JSON helpers included) so external stores
//! can persist them; timestamps serialize as RFC 3339.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::recorder::OutputChannel;

/// One typed header value.
///
/// Repeated headers are additive, so each header name maps to an ordered list
/// of these.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderValue {
    Str(String),
    Int(i64),
    #[serde(with = "time::serde::rfc3339")]
    Time(OffsetDateTime),
}

/// Cookie captured from the computation.
///
/// Kept as a plain value struct rather than a parsed wire format so snapshots
/// stay serde-friendly and replay is deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub max_age_secs: Option<i64>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            ..Self::default()
        }
    }
}

/// Immutable-after-build record of one computed response.
///
/// At most one of `is_error` / `redirect_location` drives the terminal action
/// on replay; with neither set, the normal status + body path applies.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Snapshot {
    #[serde(default = "default_status")]
    pub status: u16,
    #[serde(default)]
    pub status_message: Option<String>,
    /// True if the computation explicitly signaled an error status
    /// (`send_error`), as opposed to merely setting a non-2xx status.
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub redirect_location: Option<String>,
    #[serde(default)]
    pub character_encoding: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    /// Insertion-ordered, multi-valued headers.
    #[serde(default)]
    pub headers: Vec<(String, Vec<HeaderValue>)>,
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    #[serde(default)]
    pub body: Vec<u8>,
}

fn default_status() -> u16 {
    200
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            status: default_status(),
            status_message: None,
            is_error: false,
            redirect_location: None,
            character_encoding: None,
            content_type: None,
            locale: None,
            headers: Vec::new(),
            cookies: Vec::new(),
            body: Vec::new(),
        }
    }
}

impl Snapshot {
    /// All values recorded for `name` (case-insensitive), in insertion order.
    pub fn header(&self, name: &str) -> Option<&[HeaderValue]> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    /// Replace all values for `name`, keeping the header's original position
    /// if it already exists.
    pub(crate) fn set_header(&mut self, name: &str, value: HeaderValue) {
        if let Some((_, values)) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            values.clear();
            values.push(value);
        } else {
            self.headers.push((name.to_string(), vec![value]));
        }
    }

    /// Append a value for `name` (repeated headers are additive).
    pub(crate) fn add_header(&mut self, name: &str, value: HeaderValue) {
        if let Some((_, values)) = self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
        {
            values.push(value);
        } else {
            self.headers.push((name.to_string(), vec![value]));
        }
    }

    /// Serialize for external persistence.
    pub fn to_json_bytes(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Inverse of [`Snapshot::to_json_bytes`].
    pub fn from_json_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Reproduce this response on `out`, header-for-header and byte-for-byte.
    ///
    /// Ordering is fixed: character encoding → content type → locale →
    /// headers (multi-value order preserved) → cookies → terminal action.
    /// Headers must be fully applied before the first body byte because some
    /// transports finalize headers as soon as the body starts.
    pub fn replay<C>(&self, out: &mut C) -> anyhow::Result<()>
    where
        C: OutputChannel + ?Sized,
    {
        if let Some(enc) = &self.character_encoding {
            out.set_character_encoding(enc);
        }
        if let Some(ct) = &self.content_type {
            out.set_content_type(ct);
        }
        if let Some(locale) = &self.locale {
            out.set_locale(locale);
        }
        for (name, values) in &self.headers {
            let mut values = values.iter();
            if let Some(first) = values.next() {
                out.set_header(name, first.clone());
            }
            for v in values {
                out.add_header(name, v.clone());
            }
        }
        for cookie in &self.cookies {
            out.set_cookie(cookie.clone());
        }

        if self.is_error {
            out.send_error(self.status, self.status_message.as_deref())?;
        } else if let Some(location) = &self.redirect_location {
            out.send_redirect(location)?;
        } else {
            out.set_status(self.status, self.status_message.as_deref());
            if !self.body.is_empty() {
                out.write(&self.body)?;
            }
            out.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::testing::MockChannel;

    #[test]
    fn json_round_trip_preserves_typed_values() {
        let mut snap = Snapshot {
            status: 203,
            status_message: Some("Non-Authoritative".into()),
            content_type: Some("text/plain".into()),
            body: b"hi".to_vec(),
            ..Snapshot::default()
        };
        snap.add_header("X-Count", HeaderValue::Int(7));
        snap.add_header("X-Count", HeaderValue::Str("seven".into()));
        snap.add_header(
            "Last-Modified",
            HeaderValue::Time(OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()),
        );
        snap.cookies.push(Cookie::new("session", "abc"));

        let bytes = snap.to_json_bytes().unwrap();
        let back = Snapshot::from_json_bytes(&bytes).unwrap();
        assert_eq!(back, snap);
    }

    #[test]
    fn set_header_replaces_add_header_appends() {
        let mut snap = Snapshot::default();
        snap.set_header("X-A", HeaderValue::Int(1));
        snap.set_header("x-a", HeaderValue::Int(2));
        assert_eq!(snap.header("X-A"), Some(&[HeaderValue::Int(2)][..]));

        snap.add_header("X-A", HeaderValue::Int(3));
        assert_eq!(
            snap.header("X-A"),
            Some(&[HeaderValue::Int(2), HeaderValue::Int(3)][..])
        );
    }

    #[test]
    fn replay_applies_headers_before_body() {
        let mut snap = Snapshot {
            character_encoding: Some("utf-8".into()),
            content_type: Some("text/html".into()),
            locale: Some("en-US".into()),
            body: b"<p>ok</p>".to_vec(),
            ..Snapshot::default()
        };
        snap.add_header("X-One", HeaderValue::Str("a".into()));
        snap.add_header("X-One", HeaderValue::Str("b".into()));
        snap.cookies.push(Cookie::new("c", "v"));

        let mut out = MockChannel::default();
        snap.replay(&mut out).unwrap();

        assert_eq!(
            out.calls,
            vec![
                "set_character_encoding",
                "set_content_type",
                "set_locale",
                "set_header",
                "add_header",
                "set_cookie",
                "set_status",
                "write",
                "flush",
            ]
        );
        assert_eq!(out.body, b"<p>ok</p>");
        assert_eq!(
            out.headers,
            vec![(
                "X-One".to_string(),
                vec![
                    HeaderValue::Str("a".into()),
                    HeaderValue::Str("b".into())
                ]
            )]
        );
    }

    #[test]
    fn replay_error_is_terminal() {
        let snap = Snapshot {
            status: 503,
            status_message: Some("down".into()),
            is_error: true,
            body: b"ignored".to_vec(),
            ..Snapshot::default()
        };
        let mut out = MockChannel::default();
        snap.replay(&mut out).unwrap();
        assert_eq!(out.error, Some((503, Some("down".into()))));
        assert!(out.body.is_empty());
    }

    #[test]
    fn replay_redirect_is_terminal() {
        let snap = Snapshot {
            status: 302,
            redirect_location: Some("/elsewhere".into()),
            ..Snapshot::default()
        };
        let mut out = MockChannel::default();
        snap.replay(&mut out).unwrap();
        assert_eq!(out.redirect.as_deref(), Some("/elsewhere"));
        assert!(out.status.is_none());
    }
}
