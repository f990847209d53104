use serde_json::Value;

/// Durations above this are taken to be milliseconds.
const MILLIS_THRESHOLD: u64 = 1000;

pub fn normalize_duration(value: u64) -> u64 {
    if value > MILLIS_THRESHOLD {
        value / 1000
    } else {
        value
    }
}

/// Decodes `\uXXXX` escapes (surrogate pairs included) and `\/` in text
/// lifted out of inline scripts. An escaped backslash stays escaped so the
/// text after it is never read as an escape. Malformed escapes are kept verbatim.
pub fn decode_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let mut after = chars.clone();
        match after.next() {
            Some('/') => {
                chars = after;
                out.push('/');
            }
            Some('"') => {
                chars = after;
                out.push('"');
            }
            Some('\\') => {
                chars = after;
                out.push_str("\\\\");
            }
            Some('u') => match read_hex4(&mut after) {
                Some(high @ 0xD800..=0xDBFF) => {
                    let mut low_part = after.clone();
                    let low = (low_part.next() == Some('\\') && low_part.next() == Some('u'))
                        .then(|| read_hex4(&mut low_part))
                        .flatten()
                        .filter(|v| (0xDC00..=0xDFFF).contains(v));
                    match low {
                        Some(low) => {
                            chars = low_part;
                            let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                            out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                        }
                        None => {
                            chars = after;
                            out.push('\u{FFFD}');
                        }
                    }
                }
                Some(code) => {
                    chars = after;
                    out.push(char::from_u32(code).unwrap_or('\u{FFFD}'));
                }
                None => out.push('\\'),
            },
            _ => out.push('\\'),
        }
    }

    out
}

/// Exactly four ASCII hex digits. The iterator only advances on success.
fn read_hex4(chars: &mut std::str::Chars<'_>) -> Option<u32> {
    let hex = chars.as_str().get(..4)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let code = u32::from_str_radix(hex, 16).ok()?;
    *chars = chars.as_str()[4..].chars();
    Some(code)
}

pub fn json_str(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Reads a counter that may arrive as a number or a numeric string.
pub fn json_u64(value: &Value, pointer: &str) -> u64 {
    match value.pointer(pointer) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// First string of a `url_list`-style array.
pub fn json_first_str(value: &Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.iter().filter_map(|v| v.as_str()).find(|s| !s.is_empty()))
        .map(|s| s.to_string())
}
