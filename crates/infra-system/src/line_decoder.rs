// Output line decoding
// Never fails: invalid byte sequences become U+FFFD.

use encoding_rs::Encoding;

/// Decode one raw output line in `encoding`, dropping its `\n` / `\r\n`
/// terminator. Bytes the encoding cannot map are replaced, not rejected.
pub fn decode_line(raw: &[u8], encoding: &'static Encoding) -> String {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let (text, _had_errors) = encoding.decode_without_bom_handling(line);
    text.into_owned()
}
