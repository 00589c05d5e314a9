//! Parameters of structured header fields (RFC 2045 section 5.1) with
//! RFC 2231 extended values and continuations.

use crate::encoding::decode_charset;

/// `key=value` parameters of a structured header, in the order written.
///
/// Keys are lowercased. Quoted values are unquoted with backslash escapes
/// resolved. RFC 2231 values (`name*=utf-8''a%20b`, `name*0*=...`,
/// `name*1=...`) are decoded and stored under their base name, replacing a
/// plain value of the same name. A repeated key keeps its first value on
/// lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Parameters(Vec<(String, String)>);

impl Parameters {
    /// Split `token; key=value; ...` into the trimmed leading token and its
    /// parameters. `;` inside a quoted string does not separate parameters.
    pub(crate) fn split(value: &str) -> (&str, Self) {
        let mut segments = segments(value).into_iter();
        let head = segments.next().unwrap_or_default().trim();
        (head, Self::from_segments(segments))
    }

    fn from_segments<'a>(segments: impl Iterator<Item = &'a str>) -> Self {
        let mut plain: Vec<(String, String)> = Vec::new();
        let mut extended: Vec<(String, Vec<Piece>)> = Vec::new();

        for segment in segments {
            let Some((key, raw)) = segment.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            if key.is_empty() {
                continue;
            }
            let value = unquote(raw.trim());

            let Some((base, section)) = key.split_once('*') else {
                plain.push((key, value));
                continue;
            };
            let Some(piece) = Piece::parse(section, value) else {
                continue;
            };
            match extended.iter_mut().find(|(name, _)| name == base) {
                Some((_, pieces)) => pieces.push(piece),
                None => extended.push((base.to_string(), vec![piece])),
            }
        }

        for (name, pieces) in extended {
            let Some(value) = join_pieces(pieces) else {
                continue;
            };
            match plain.iter_mut().find(|(key, _)| *key == name) {
                Some((_, existing)) => *existing = value,
                None => plain.push((name, value)),
            }
        }

        Self(plain)
    }

    /// Value of `key`, matched case-insensitively.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// One section of an RFC 2231 parameter.
struct Piece {
    index: u32,
    encoded: bool,
    value: String,
}

impl Piece {
    /// `section` follows the first `*` of the key: empty for `name*`, else
    /// `N` or `N*`.
    fn parse(section: &str, value: String) -> Option<Self> {
        if section.is_empty() {
            return Some(Self {
                index: 0,
                encoded: true,
                value,
            });
        }
        let (digits, encoded) = match section.strip_suffix('*') {
            Some(digits) => (digits, true),
            None => (section, false),
        };
        Some(Self {
            index: digits.parse().ok()?,
            encoded,
            value,
        })
    }
}

/// Concatenate sections in index order and decode them.
///
/// The first encoded section carries `charset'language'` before its text.
/// Returns `None` for a charset that cannot be decoded.
fn join_pieces(mut pieces: Vec<Piece>) -> Option<String> {
    pieces.sort_by_key(|piece| piece.index);

    let mut charset = None;
    let mut bytes = Vec::new();
    for (position, piece) in pieces.iter().enumerate() {
        if !piece.encoded {
            bytes.extend_from_slice(piece.value.as_bytes());
            continue;
        }
        let mut text = piece.value.as_str();
        if position == 0 {
            let mut fields = text.splitn(3, '\'');
            if let (Some(declared), Some(_language), Some(rest)) =
                (fields.next(), fields.next(), fields.next())
            {
                charset = Some(declared);
                text = rest;
            }
        }
        bytes.extend(percent_decode(text));
    }

    match charset.filter(|c| !c.is_empty()) {
        Some(charset) => decode_charset(charset, bytes).ok(),
        None => Some(String::from_utf8_lossy(&bytes).into_owned()),
    }
}

/// `%XX` escapes to bytes; a malformed escape is kept as written.
fn percent_decode(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && let Some(hex) = bytes.get(i + 1..i + 3)
            && hex.iter().all(u8::is_ascii_hexdigit)
            && let Ok(byte) = u8::from_str_radix(&String::from_utf8_lossy(hex), 16)
        {
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

/// Split on `;` outside quoted strings.
fn segments(value: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    let mut escaped = false;

    for (i, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if quoted => escaped = true,
            '"' => quoted = !quoted,
            ';' if !quoted => {
                segments.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    segments.push(&value[start..]);
    segments
}

/// Strip surrounding quotes and resolve backslash escapes. Unquoted values
/// are returned as written.
fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"') else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.extend(chars.next()),
            '"' => break,
            _ => out.push(c),
        }
    }
    out
}
