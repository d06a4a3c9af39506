//! Text encoding probing for delimited files.

use std::path::Path;

use encoding_rs::{Encoding, GBK, UTF_8, WINDOWS_1252};

use crate::error::{PrepError, Result};
use crate::prompt::{ConfirmProvider, Question};

/// Encodings tried, in order, before asking for the latin1 fallback.
pub const CANDIDATE_ENCODINGS: &[&str] = &["utf-8", "gbk", "gb2312", "cp936"];

/// Name reported when the byte-preserving fallback was used.
pub const FALLBACK_ENCODING: &str = "ISO-8859-1";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Text decoded from a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    /// Decoded contents.
    pub text: String,
    /// Name of the encoding that succeeded.
    pub encoding: String,
}

/// Resolve an encoding label, accepting Windows code page aliases that the
/// WHATWG label list lacks (`cp936`).
pub fn encoding_for_label(label: &str) -> Option<&'static Encoding> {
    let label = label.trim();
    Encoding::for_label(label.as_bytes()).or_else(|| {
        label
            .to_ascii_lowercase()
            .strip_prefix("cp")
            .and_then(|n| n.parse::<u32>().ok())
            .and_then(encoding_for_codepage)
    })
}

/// Map a Windows code page number to an encoding.
pub fn encoding_for_codepage(codepage: u32) -> Option<&'static Encoding> {
    match codepage {
        65001 => Some(UTF_8),
        936 | 20936 | 54936 => Some(GBK),
        // ASCII and latin1 are read through their windows-1252 superset.
        1252 | 20127 | 28591 => Some(WINDOWS_1252),
        other => Encoding::for_label(format!("windows-{other}").as_bytes())
            .or_else(|| Encoding::for_label(format!("cp{other}").as_bytes())),
    }
}

/// Decode `bytes` with the first candidate that accepts them without errors.
///
/// When every candidate fails the provider is asked whether to decode as
/// latin1; refusing fails with [`PrepError::Encoding`].
pub fn decode_with_fallback(
    bytes: &[u8],
    path: &Path,
    candidates: &[String],
    provider: &dyn ConfirmProvider,
) -> Result<DecodedText> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut tried: Vec<&'static Encoding> = Vec::new();

    for label in candidates {
        let Some(encoding) = encoding_for_label(label) else {
            tracing::warn!(label = %label, "unknown encoding label skipped");
            continue;
        };
        if tried.contains(&encoding) {
            continue;
        }
        tried.push(encoding);

        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            tracing::debug!(encoding = encoding.name(), path = %path.display(), "decoded text");
            return Ok(DecodedText {
                text: text.into_owned(),
                encoding: encoding.name().to_string(),
            });
        }
        tracing::debug!(encoding = encoding.name(), "decoding failed, trying next candidate");
    }

    let tried: Vec<String> = tried.iter().map(|e| e.name().to_string()).collect();
    let question = Question::EncodingFallback {
        path: path.to_path_buf(),
        tried: tried.clone(),
    };

    if provider.confirm(&question) {
        tracing::warn!(path = %path.display(), "decoding as {FALLBACK_ENCODING} after confirmation");
        Ok(DecodedText {
            text: encoding_rs::mem::decode_latin1(bytes).into_owned(),
            encoding: FALLBACK_ENCODING.to_string(),
        })
    } else {
        Err(PrepError::Encoding {
            path: path.to_path_buf(),
            tried,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::AutoConfirm;

    fn candidates() -> Vec<String> {
        CANDIDATE_ENCODINGS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_labels_resolve() {
        assert_eq!(encoding_for_label("utf-8"), Some(UTF_8));
        assert_eq!(encoding_for_label("gbk"), Some(GBK));
        assert_eq!(encoding_for_label("gb2312"), Some(GBK));
        assert_eq!(encoding_for_label("cp936"), Some(GBK));
        assert_eq!(encoding_for_label("no-such-encoding"), None);
    }

    #[test]
    fn test_utf8_with_bom() {
        let bytes = "\u{feff}x,y\n1,2\n".as_bytes();
        let decoded =
            decode_with_fallback(bytes, Path::new("a.csv"), &candidates(), &AutoConfirm::no())
                .unwrap();
        assert_eq!(decoded.text, "x,y\n1,2\n");
        assert_eq!(decoded.encoding, "UTF-8");
    }

    #[test]
    fn test_gbk_decoded_without_prompt() {
        // "姓名" in GBK is not valid UTF-8.
        let bytes = b"\xd0\xd5\xc3\xfb,y\n1,2\n";
        let decoded =
            decode_with_fallback(bytes, Path::new("a.csv"), &candidates(), &AutoConfirm::no())
                .unwrap();
        assert_eq!(decoded.encoding, "GBK");
        assert!(decoded.text.starts_with("姓名,y"));
    }

    #[test]
    fn test_fallback_requires_consent() {
        // 0xE9 followed by a comma is invalid in both UTF-8 and GBK.
        let bytes = b"caf\xe9,y\n1,2\n";

        let err = decode_with_fallback(bytes, Path::new("a.csv"), &candidates(), &AutoConfirm::no())
            .unwrap_err();
        match err {
            PrepError::Encoding { tried, .. } => assert_eq!(tried, vec!["UTF-8", "GBK"]),
            other => panic!("unexpected error: {other}"),
        }

        let decoded =
            decode_with_fallback(bytes, Path::new("a.csv"), &candidates(), &AutoConfirm::yes())
                .unwrap();
        assert_eq!(decoded.encoding, FALLBACK_ENCODING);
        assert!(decoded.text.starts_with("café,y"));
    }
}
