//! Binary shortcuts codec
//!
//! Valve's binary keyed-value layout, little-endian:
//! - `0x00 key\0 ...nested... 0x08` — nested map
//! - `0x01 key\0 value\0`           — string
//! - `0x02 key\0 <4 bytes>`         — u32
//!
//! The file is a single top-level map named `shortcuts` whose children are
//! the records, keyed by the decimal slot index. Encoding is deterministic
//! (records in slot order, fields in stored order), so decode/encode is a
//! byte-identical round-trip.

use std::collections::BTreeMap;

use super::{FieldValue, Shortcut, ShortcutsError};

/// The in-memory form of the container: slot index -> record.
pub type ShortcutMap = BTreeMap<u32, Shortcut>;

const TYPE_MAP: u8 = 0x00;
const TYPE_STRING: u8 = 0x01;
const TYPE_U32: u8 = 0x02;
const TYPE_END: u8 = 0x08;

const TOP_KEY: &str = "shortcuts";

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn u8(&mut self) -> Result<u8, ShortcutsError> {
        let b = *self
            .buf
            .get(self.pos)
            .ok_or_else(|| truncated(self.pos))?;
        self.pos += 1;
        Ok(b)
    }

    fn u32le(&mut self) -> Result<u32, ShortcutsError> {
        let end = self.pos + 4;
        let bytes = self
            .buf
            .get(self.pos..end)
            .ok_or_else(|| truncated(self.pos))?;
        self.pos = end;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// NUL-terminated UTF-8 string.
    fn cstr(&mut self) -> Result<String, ShortcutsError> {
        let rest = &self.buf[self.pos..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| truncated(self.buf.len()))?;
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|_| ShortcutsError::Malformed(format!("invalid utf-8 at byte {}", self.pos)))?
            .to_string();
        self.pos += nul + 1;
        Ok(s)
    }

    fn at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

fn truncated(pos: usize) -> ShortcutsError {
    ShortcutsError::Malformed(format!("unexpected end of input at byte {pos}"))
}

fn read_map(r: &mut Reader<'_>) -> Result<Vec<(String, FieldValue)>, ShortcutsError> {
    let mut fields = Vec::new();
    loop {
        let ty = r.u8()?;
        if ty == TYPE_END {
            return Ok(fields);
        }
        let key = r.cstr()?;
        let value = match ty {
            TYPE_MAP => FieldValue::Map(read_map(r)?),
            TYPE_STRING => FieldValue::Str(r.cstr()?),
            TYPE_U32 => FieldValue::U32(r.u32le()?),
            other => {
                return Err(ShortcutsError::Malformed(format!(
                    "unknown field type 0x{other:02x} for key '{key}'"
                )))
            }
        };
        fields.push((key, value));
    }
}

/// Decode a shortcuts container from raw bytes.
///
/// Records land in a map keyed by slot index, so a container another tool
/// wrote out of slot order is canonicalized to slot order on the next
/// encode. Slot keys and per-record bytes are preserved exactly; only the
/// record sequence within the file changes, once.
pub fn decode(bytes: &[u8]) -> Result<ShortcutMap, ShortcutsError> {
    let mut r = Reader::new(bytes);

    let ty = r.u8()?;
    if ty != TYPE_MAP {
        return Err(ShortcutsError::Malformed(format!(
            "expected top-level map, got type 0x{ty:02x}"
        )));
    }
    let top = r.cstr()?;
    if !top.eq_ignore_ascii_case(TOP_KEY) {
        return Err(ShortcutsError::Malformed(format!(
            "expected '{TOP_KEY}' top-level key, got '{top}'"
        )));
    }

    let mut map = ShortcutMap::new();
    loop {
        let ty = r.u8()?;
        if ty == TYPE_END {
            break;
        }
        if ty != TYPE_MAP {
            return Err(ShortcutsError::Malformed(format!(
                "expected record map, got type 0x{ty:02x}"
            )));
        }
        let key = r.cstr()?;
        let slot: u32 = key.parse().map_err(|_| {
            ShortcutsError::Malformed(format!("non-numeric record key '{key}'"))
        })?;
        let fields = read_map(&mut r)?;
        if map.insert(slot, Shortcut { fields }).is_some() {
            return Err(ShortcutsError::Malformed(format!(
                "duplicate slot index {slot}"
            )));
        }
    }

    // Closing byte of the implicit root map
    if r.u8()? != TYPE_END {
        return Err(ShortcutsError::Malformed(
            "missing trailing end marker".to_string(),
        ));
    }
    if !r.at_end() {
        return Err(ShortcutsError::Malformed(format!(
            "{} trailing bytes after container",
            bytes.len() - r.pos
        )));
    }

    Ok(map)
}

fn write_cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

fn write_map(out: &mut Vec<u8>, fields: &[(String, FieldValue)]) {
    for (key, value) in fields {
        match value {
            FieldValue::Map(inner) => {
                out.push(TYPE_MAP);
                write_cstr(out, key);
                write_map(out, inner);
            }
            FieldValue::Str(s) => {
                out.push(TYPE_STRING);
                write_cstr(out, key);
                write_cstr(out, s);
            }
            FieldValue::U32(n) => {
                out.push(TYPE_U32);
                write_cstr(out, key);
                out.extend_from_slice(&n.to_le_bytes());
            }
        }
    }
    out.push(TYPE_END);
}

/// Encode a container. Deterministic: same map, same bytes.
pub fn encode(map: &ShortcutMap) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(TYPE_MAP);
    write_cstr(&mut out, TOP_KEY);
    for (slot, shortcut) in map {
        out.push(TYPE_MAP);
        write_cstr(&mut out, &slot.to_string());
        write_map(&mut out, &shortcut.fields);
    }
    out.push(TYPE_END);
    out.push(TYPE_END);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortcuts::shortcut_map;

    fn sample_map() -> ShortcutMap {
        let mut tagged = Shortcut::new("Rocket Game", "/games/rocket/start.sh", "/games/rocket", "epic:rocket1");
        if let Some(FieldValue::Map(tags)) = tagged
            .fields
            .iter_mut()
            .find(|(k, _)| k == "tags")
            .map(|(_, v)| v)
        {
            tags.push(("0".to_string(), FieldValue::Str("favorite".to_string())));
        }
        shortcut_map([
            (0, Shortcut::new("Alpha", "/bin/alpha", "/bin", "")),
            (3, tagged),
            (7, Shortcut::new("Gamma", "/opt/gamma", "/opt", "gog:g-77")),
        ])
    }

    #[test]
    fn test_round_trip() {
        let map = sample_map();
        let bytes = encode(&map);
        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, map);
        // Byte-identical re-encode
        assert_eq!(encode(&decoded), bytes);
    }

    #[test]
    fn test_empty_round_trip() {
        let map = ShortcutMap::new();
        let bytes = encode(&map);
        assert_eq!(decode(&bytes).unwrap(), map);
    }

    #[test]
    fn test_encode_deterministic() {
        let map = sample_map();
        assert_eq!(encode(&map), encode(&map));
    }

    #[test]
    fn test_truncated_input_is_malformed() {
        let bytes = encode(&sample_map());
        let err = decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, ShortcutsError::Malformed(_)));
    }

    #[test]
    fn test_empty_input_is_malformed() {
        assert!(matches!(
            decode(&[]).unwrap_err(),
            ShortcutsError::Malformed(_)
        ));
    }

    #[test]
    fn test_unknown_type_byte_is_malformed() {
        let mut bytes = encode(&ShortcutMap::new());
        // Splice a bogus field type where the first record would start
        bytes.truncate(bytes.len() - 2);
        bytes.extend_from_slice(&[0x05, b'x', 0, 0x08, 0x08]);
        assert!(matches!(
            decode(&bytes).unwrap_err(),
            ShortcutsError::Malformed(_)
        ));
    }

    #[test]
    fn test_duplicate_slot_is_malformed() {
        let mut bytes = vec![TYPE_MAP];
        write_cstr(&mut bytes, TOP_KEY);
        for _ in 0..2 {
            bytes.push(TYPE_MAP);
            write_cstr(&mut bytes, "1");
            bytes.push(TYPE_END);
        }
        bytes.push(TYPE_END);
        bytes.push(TYPE_END);
        assert!(matches!(
            decode(&bytes).unwrap_err(),
            ShortcutsError::Malformed(_)
        ));
    }

    #[test]
    fn test_out_of_order_input_is_canonicalized_preserving_records() {
        // Hand-build a container with records in reverse slot order
        let a = Shortcut::new("A", "/a", "/", "");
        let b = Shortcut::new("B", "/b", "/", "gog:b1");
        let mut bytes = vec![TYPE_MAP];
        write_cstr(&mut bytes, TOP_KEY);
        for (slot, record) in [(9u32, &b), (2u32, &a)] {
            bytes.push(TYPE_MAP);
            write_cstr(&mut bytes, &slot.to_string());
            write_map(&mut bytes, &record.fields);
        }
        bytes.push(TYPE_END);
        bytes.push(TYPE_END);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded[&2], a);
        assert_eq!(decoded[&9], b);

        // Re-encode sorts by slot; records and keys are intact, so the
        // result equals a container built in slot order
        let canonical = encode(&shortcut_map([(2, a), (9, b)]));
        assert_eq!(encode(&decoded), canonical);
        assert_ne!(encode(&decoded), bytes);
    }

    #[test]
    fn test_unrecognized_fields_survive_round_trip() {
        let mut sc = Shortcut::new("Mod Game", "/m", "/", "");
        sc.fields
            .insert(2, ("FlatpakAppID".to_string(), FieldValue::Str("org.x.Y".to_string())));
        sc.fields.push((
            "devkit".to_string(),
            FieldValue::Map(vec![("serial".to_string(), FieldValue::U32(9))]),
        ));
        let map = shortcut_map([(12, sc)]);
        let bytes = encode(&map);
        assert_eq!(encode(&decode(&bytes).unwrap()), bytes);
    }
}
