//! Bounded byte-string helpers for NUL-terminated kernel strings.

/// Length of the C string held in `bytes`: up to the first NUL, or the whole
/// slice if there is none.
pub fn c_str_len(bytes: &[u8]) -> usize {
    bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len())
}

/// Copy the C string in `src` into `dst`, truncating so that `dst` always ends
/// up NUL-terminated. Bytes after the terminator are cleared. Returns the
/// number of string bytes copied.
pub fn copy_truncated(dst: &mut [u8], src: &[u8]) -> usize {
    if dst.is_empty() {
        return 0;
    }
    let len = c_str_len(src).min(dst.len() - 1);
    dst[..len].copy_from_slice(&src[..len]);
    dst[len..].fill(0);
    len
}

/// The text after the final `/` of `path`.
pub fn last_path_component(path: &[u8]) -> &[u8] {
    let path = &path[..c_str_len(path)];
    match path.iter().rposition(|&b| b == b'/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}
