//! Upstream `Content-Type` handling.
//!
//! The gateway always answers with `application/rss+xml`; only the charset
//! parameter of the upstream header survives.

use encoding_rs::{Encoding, UTF_8};
use quick_xml::events::Event;
use quick_xml::Reader;

pub const RSS_MIME: &str = "application/rss+xml";
pub const DEFAULT_CHARSET: &str = "utf-8";

/// The `charset` parameter of a `Content-Type` header, if any.
///
/// Tolerant: a missing header, a malformed parameter list, or an empty value
/// all yield `None`. Values that are not valid header tokens are ignored so
/// they can never poison the downstream header.
pub fn charset_of(content_type: Option<&str>) -> Option<String> {
    let header = content_type?;
    header.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"').trim();
        if value.is_empty() || !value.chars().all(is_token_char) {
            return None;
        }
        Some(value.to_string())
    })
}

/// Content type sent downstream: `application/rss+xml; charset=<X>`.
pub fn downstream_content_type(content_type: Option<&str>) -> String {
    let charset = charset_of(content_type).unwrap_or_else(|| DEFAULT_CHARSET.to_string());
    format!("{}; charset={}", RSS_MIME, charset)
}

/// Decode an upstream body.
///
/// The `Content-Type` charset wins, then the XML declaration's `encoding`,
/// then UTF-8. Invalid sequences are replaced rather than rejected. A leading
/// BOM overrides both labels.
pub fn decode_body(body: &[u8], content_type: Option<&str>) -> String {
    let encoding = charset_of(content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| declared_encoding(body))
        .unwrap_or(UTF_8);
    let (text, used, had_errors) = encoding.decode(body);
    if had_errors {
        tracing::debug!(encoding = used.name(), "Upstream body contained malformed sequences");
    }
    text.into_owned()
}

/// Encoding the rewritten document should be serialised in.
///
/// Follows the upstream charset so the body agrees with the downstream
/// header. Labels encoding_rs does not know fall back to UTF-8, as do
/// encodings it can only decode (UTF-16 and friends).
pub fn output_encoding(content_type: Option<&str>) -> &'static Encoding {
    charset_of(content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .map(Encoding::output_encoding)
        .unwrap_or(UTF_8)
}

/// Label for the XML declaration of the rewritten document.
///
/// The upstream's own spelling when it names the output encoding
/// (`ISO-8859-1` stays `ISO-8859-1` rather than becoming `windows-1252`),
/// otherwise the canonical name of [`output_encoding`].
pub fn output_label(content_type: Option<&str>) -> String {
    let encoding = output_encoding(content_type);
    charset_of(content_type)
        .filter(|label| Encoding::for_label(label.as_bytes()) == Some(encoding))
        .unwrap_or_else(|| encoding.name().to_string())
}

/// The `encoding` named by a leading `<?xml ...?>` declaration.
///
/// Only ASCII-compatible encodings count: a document that really is UTF-16
/// starts with a BOM, and one that is not cannot be read with that label.
fn declared_encoding(body: &[u8]) -> Option<&'static Encoding> {
    let mut reader = Reader::from_reader(body);
    let decl = match reader.read_event() {
        Ok(Event::Decl(decl)) => decl,
        _ => return None,
    };
    let label = decl.encoding()?.ok()?;
    Encoding::for_label(&label).filter(|enc| enc.output_encoding() == *enc)
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c)
}
