//! Pass-through response capture.
//!
//! [`ResponseRecorder`] wraps the live output channel so the wrapped handler
//! behaves exactly as if it were uncached: every call is forwarded to the real
//! channel unchanged and mirrored into a private [`Snapshot`] under
//! construction. Body bytes are streamed live and buffered in memory; the
//! buffer becomes the snapshot body at [`ResponseRecorder::finish`].
//!
//! The snapshot only leaves the recorder through `finish`, after the handler
//! returned normally. If a channel write fails mid-computation the error
//! propagates and no partially-captured snapshot exists to be cached.

use crate::snapshot::{Cookie, HeaderValue, Snapshot};

/// Capability consumed by the recorder and by snapshot replay.
///
/// This is the interface boundary to the transport layer; the crate never
/// parses or emits a wire format itself. Pure setters are infallible;
/// operations that may touch the underlying stream return errors.
pub trait OutputChannel {
    fn set_status(&mut self, status: u16, message: Option<&str>);
    /// Replace all values recorded for `name`.
    fn set_header(&mut self, name: &str, value: HeaderValue);
    /// Append a value for `name` (repeated headers are additive).
    fn add_header(&mut self, name: &str, value: HeaderValue);
    fn set_cookie(&mut self, cookie: Cookie);
    fn set_content_type(&mut self, value: &str);
    fn set_character_encoding(&mut self, value: &str);
    fn set_locale(&mut self, locale: &str);
    fn send_redirect(&mut self, location: &str) -> anyhow::Result<()>;
    fn send_error(&mut self, status: u16, message: Option<&str>) -> anyhow::Result<()>;
    fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()>;
    fn flush(&mut self) -> anyhow::Result<()>;
}

/// Wraps the live channel and mirrors every mutation into a snapshot.
pub struct ResponseRecorder<'a, C: OutputChannel + ?Sized> {
    channel: &'a mut C,
    snapshot: Snapshot,
    body: Vec<u8>,
}

impl<'a, C: OutputChannel + ?Sized> ResponseRecorder<'a, C> {
    pub fn new(channel: &'a mut C) -> Self {
        Self {
            channel,
            snapshot: Snapshot::default(),
            body: Vec::new(),
        }
    }

    /// Finalize the capture and freeze the snapshot.
    ///
    /// Flushes the live channel, moves the buffered body into the snapshot and
    /// derives `Content-Length` from the buffer, overriding any value the
    /// handler set earlier. An early content-length cannot be trusted:
    /// compression or templating may change the final size, so the length is
    /// always taken from what was actually captured.
    pub fn finish(mut self) -> anyhow::Result<Snapshot> {
        self.channel.flush()?;
        self.snapshot.body = self.body;
        self.snapshot.set_header(
            "Content-Length",
            HeaderValue::Int(self.snapshot.body.len() as i64),
        );
        Ok(self.snapshot)
    }
}

impl<C: OutputChannel + ?Sized> OutputChannel for ResponseRecorder<'_, C> {
    fn set_status(&mut self, status: u16, message: Option<&str>) {
        self.channel.set_status(status, message);
        self.snapshot.status = status;
        self.snapshot.status_message = message.map(str::to_string);
    }

    fn set_header(&mut self, name: &str, value: HeaderValue) {
        self.channel.set_header(name, value.clone());
        self.snapshot.set_header(name, value);
    }

    fn add_header(&mut self, name: &str, value: HeaderValue) {
        self.channel.add_header(name, value.clone());
        self.snapshot.add_header(name, value);
    }

    fn set_cookie(&mut self, cookie: Cookie) {
        self.channel.set_cookie(cookie.clone());
        self.snapshot.cookies.push(cookie);
    }

    fn set_content_type(&mut self, value: &str) {
        self.channel.set_content_type(value);
        self.snapshot.content_type = Some(value.to_string());
    }

    fn set_character_encoding(&mut self, value: &str) {
        self.channel.set_character_encoding(value);
        self.snapshot.character_encoding = Some(value.to_string());
    }

    fn set_locale(&mut self, locale: &str) {
        self.channel.set_locale(locale);
        self.snapshot.locale = Some(locale.to_string());
    }

    fn send_redirect(&mut self, location: &str) -> anyhow::Result<()> {
        self.channel.send_redirect(location)?;
        self.snapshot.redirect_location = Some(location.to_string());
        Ok(())
    }

    fn send_error(&mut self, status: u16, message: Option<&str>) -> anyhow::Result<()> {
        self.channel.send_error(status, message)?;
        self.snapshot.status = status;
        self.snapshot.status_message = message.map(str::to_string);
        self.snapshot.is_error = true;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.channel.write(bytes)?;
        self.body.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        self.channel.flush()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records every channel call for assertions.
    ///
    /// `fail_writes` simulates a broken downstream connection.
    #[derive(Debug, Default)]
    pub(crate) struct MockChannel {
        pub calls: Vec<&'static str>,
        pub status: Option<(u16, Option<String>)>,
        pub headers: Vec<(String, Vec<HeaderValue>)>,
        pub cookies: Vec<Cookie>,
        pub content_type: Option<String>,
        pub character_encoding: Option<String>,
        pub locale: Option<String>,
        pub redirect: Option<String>,
        pub error: Option<(u16, Option<String>)>,
        pub body: Vec<u8>,
        pub flushes: usize,
        pub fail_writes: bool,
    }

    impl OutputChannel for MockChannel {
        fn set_status(&mut self, status: u16, message: Option<&str>) {
            self.calls.push("set_status");
            self.status = Some((status, message.map(str::to_string)));
        }

        fn set_header(&mut self, name: &str, value: HeaderValue) {
            self.calls.push("set_header");
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

        fn add_header(&mut self, name: &str, value: HeaderValue) {
            self.calls.push("add_header");
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

        fn set_cookie(&mut self, cookie: Cookie) {
            self.calls.push("set_cookie");
            self.cookies.push(cookie);
        }

        fn set_content_type(&mut self, value: &str) {
            self.calls.push("set_content_type");
            self.content_type = Some(value.to_string());
        }

        fn set_character_encoding(&mut self, value: &str) {
            self.calls.push("set_character_encoding");
            self.character_encoding = Some(value.to_string());
        }

        fn set_locale(&mut self, locale: &str) {
            self.calls.push("set_locale");
            self.locale = Some(locale.to_string());
        }

        fn send_redirect(&mut self, location: &str) -> anyhow::Result<()> {
            self.calls.push("send_redirect");
            self.redirect = Some(location.to_string());
            Ok(())
        }

        fn send_error(&mut self, status: u16, message: Option<&str>) -> anyhow::Result<()> {
            self.calls.push("send_error");
            self.error = Some((status, message.map(str::to_string)));
            Ok(())
        }

        fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
            self.calls.push("write");
            if self.fail_writes {
                anyhow::bail!("downstream connection closed");
            }
            self.body.extend_from_slice(bytes);
            Ok(())
        }

        fn flush(&mut self) -> anyhow::Result<()> {
            self.calls.push("flush");
            self.flushes += 1;
            Ok(())
        }
    }
}
