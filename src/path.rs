//! Path normalization.
//!
//! Host calls hand the engine fully-qualified paths with a drive prefix
//! (`X:\DIR\FILE.EXT`). The wire carries only the tail after the prefix;
//! directory enumeration additionally needs the final component as an
//! 8+3 space-padded template.

use memchr::{memchr2, memrchr};

/// The path tail transmitted on the wire: everything after the `X:`
/// prefix. `None` when the path is too short to carry a prefix.
pub(crate) fn strip_drive(path: &[u8]) -> Option<&[u8]> {
    if path.len() < 2 || path[1] != b':' {
        return None;
    }
    Some(&path[2..])
}

/// True when the tail contains a DOS wildcard.
pub(crate) fn has_wildcard(tail: &[u8]) -> bool {
    memchr2(b'*', b'?', tail).is_some()
}

/// Build the 11-byte FCB-style search template from a path tail: the
/// characters after the last backslash, space-padded, with `.` jumping the
/// write position to the extension field.
pub(crate) fn fcb_template(tail: &[u8]) -> [u8; 11] {
    let name = match memrchr(b'\\', tail) {
        Some(i) => &tail[i + 1..],
        None => tail,
    };
    let mut out = [b' '; 11];
    let mut w = 0;
    for &c in name {
        if c == b'.' {
            w = 8;
        } else if w < out.len() {
            out[w] = c;
            w += 1;
        }
    }
    out
}
