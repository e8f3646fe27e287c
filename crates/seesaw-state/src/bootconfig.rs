//! Boot loader command-line handling.
//!
//! The boot configuration is a kernel command line containing a
//! `root=<device>` token. The pointer rewrite replaces the value of every
//! `root=` token and leaves every other byte of the file untouched, so
//! whatever else the image builder put there survives verbatim.

/// The token prefix carrying the root device.
const ROOT_PREFIX: &str = "root=";

/// The device named by the first `root=` token, if any.
#[must_use]
pub fn pointer_device(content: &str) -> Option<&str> {
    token_spans(content)
        .into_iter()
        .find_map(|(start, end)| content[start..end].strip_prefix(ROOT_PREFIX))
        .filter(|device| !device.is_empty())
}

/// `content` with the value of every `root=` token replaced by `device`.
///
/// Returns `None` when no `root=` token exists; the caller decides whether
/// that is corruption or a layout without one.
#[must_use]
pub fn rewrite_pointer(content: &str, device: &str) -> Option<String> {
    let spans: Vec<(usize, usize)> = token_spans(content)
        .into_iter()
        .filter(|&(start, end)| content[start..end].starts_with(ROOT_PREFIX))
        .collect();
    if spans.is_empty() {
        return None;
    }

    let mut out = String::with_capacity(content.len());
    let mut cursor = 0;
    for (start, end) in spans {
        out.push_str(&content[cursor..start]);
        out.push_str(ROOT_PREFIX);
        out.push_str(device);
        cursor = end;
    }
    out.push_str(&content[cursor..]);
    Some(out)
}

/// Byte spans of whitespace-separated tokens.
fn token_spans(content: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (idx, ch) in content.char_indices() {
        if ch.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, idx));
            }
        } else if start.is_none() {
            start = Some(idx);
        }
    }
    if let Some(s) = start {
        spans.push((s, content.len()));
    }
    spans
}
