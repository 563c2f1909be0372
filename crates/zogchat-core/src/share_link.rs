// Share links: the out-of-band invitation carrying the session identifier
// and the inviter's name as query parameters.
//
//   zogchat://join?session=ws%3A%2F%2F192.168.1.10%3A9470%2F4f1c...&inviter=Ana

use std::fmt;

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ShareLinkError {
    #[error("share link has no query string")]
    MissingQuery,

    #[error("share link has no session parameter")]
    MissingSession,

    #[error("share link parameter `{key}` is not valid percent-encoded UTF-8")]
    BadEncoding { key: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShareLink {
    pub base: String,
    pub session: String,
    pub inviter: Option<String>,
}

impl ShareLink {
    pub fn new(base: impl Into<String>, session: impl Into<String>, inviter: &str) -> Self {
        let inviter = inviter.trim();
        ShareLink {
            base: base.into(),
            session: session.into(),
            inviter: (!inviter.is_empty()).then(|| inviter.to_string()),
        }
    }

    /// Parse a share link. Everything before the `?` is kept as the base.
    pub fn parse(text: &str) -> Result<Self, ShareLinkError> {
        let text = text.trim();
        let (base, query) = text.split_once('?').ok_or(ShareLinkError::MissingQuery)?;
        // Drop a fragment if someone pasted one along.
        let query = query.split('#').next().unwrap_or_default();

        let mut session = None;
        let mut inviter = None;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |raw: &str| {
                decode_component(raw).ok_or_else(|| ShareLinkError::BadEncoding {
                    key: key.to_string(),
                })
            };
            match key {
                "session" => session = Some(decode(raw)?),
                "inviter" => inviter = Some(decode(raw)?),
                _ => {}
            }
        }

        let session = session
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ShareLinkError::MissingSession)?;
        let inviter = inviter
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Ok(ShareLink {
            base: base.to_string(),
            session,
            inviter,
        })
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?session={}", self.base, encode_component(&self.session))?;
        if let Some(inviter) = &self.inviter {
            write!(f, "&inviter={}", encode_component(inviter))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Percent encoding (encodeURIComponent semantics)
// ---------------------------------------------------------------------------

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric()
        || matches!(b, b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\'' | b'(' | b')')
}

pub fn encode_component(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for &b in input.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Decode `%XX` escapes and `+` (as a space). Returns `None` on a truncated
/// escape, a non-hex digit, or bytes that are not UTF-8.
pub fn decode_component(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes.get(i + 1..i + 3)?;
                if !hex.iter().all(u8::is_ascii_hexdigit) {
                    return None;
                }
                let hex = std::str::from_utf8(hex).ok()?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).ok()
}
