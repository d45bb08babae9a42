//! Byte-to-text conversions for strings stored in target memory.

use crate::error::{ProbeError, Result};

/// Render bytes for a terminal-style display.
///
/// Bytes map to Latin-1 characters, except:
/// - `0x00..=0x03` become a space
/// - `0x04` becomes `|`
/// - a space becomes a no-break space (U+00A0)
/// - `0xFB` becomes `\`
pub fn display_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b {
            0x00..=0x03 => ' ',
            0x04 => '|',
            b' ' => '\u{a0}',
            0xFB => '\\',
            _ => char::from(b),
        })
        .collect()
}

/// Decode Windows-1254 (Turkish) text.
///
/// Bytes the code page leaves unassigned are an encoding error.
pub fn decode_cp1254(bytes: &[u8]) -> Result<String> {
    bytes
        .iter()
        .enumerate()
        .map(|(i, &b)| {
            cp1254_char(b).ok_or_else(|| {
                ProbeError::Encoding(format!(
                    "Byte 0x{:02x} at offset {} is not valid cp1254",
                    b, i
                ))
            })
        })
        .collect()
}

/// 0x80..=0x9F; `None` marks unassigned bytes.
const CP1254_HIGH: [Option<char>; 32] = [
    Some('\u{20ac}'),
    None,
    Some('\u{201a}'),
    Some('\u{0192}'),
    Some('\u{201e}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02c6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    None,
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201c}'),
    Some('\u{201d}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02dc}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203a}'),
    Some('\u{0153}'),
    None,
    None,
    Some('\u{0178}'),
];

fn cp1254_char(b: u8) -> Option<char> {
    match b {
        0x80..=0x9F => CP1254_HIGH[usize::from(b - 0x80)],
        // Turkish letters replacing the Icelandic ones of Latin-1
        0xD0 => Some('\u{011e}'),
        0xDD => Some('\u{0130}'),
        0xDE => Some('\u{015e}'),
        0xF0 => Some('\u{011f}'),
        0xFD => Some('\u{0131}'),
        0xFE => Some('\u{015f}'),
        _ => Some(char::from(b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_ascii_substitutions() {
        assert_eq!(display_ascii(b"OK\0\x01\x04 go"), "OK  |\u{a0}go");
        assert_eq!(display_ascii(b"a/b-c\xfb"), "a/b-c\\");
        assert_eq!(display_ascii(&[0xE9]), "\u{e9}");
    }

    #[test]
    fn test_cp1254_turkish_letters() {
        let text = decode_cp1254(&[0x49, 0xFD, 0x6B, 0x20, 0xDE, 0xF0, 0x80]).unwrap();
        assert_eq!(text, "Iık Şğ€");
        assert_eq!(decode_cp1254(b"plain").unwrap(), "plain");
    }

    #[test]
    fn test_cp1254_unassigned_byte() {
        let err = decode_cp1254(&[0x41, 0x81]).unwrap_err();
        assert!(matches!(err, ProbeError::Encoding(_)));
        assert!(err.to_string().contains("offset 1"));
    }
}
