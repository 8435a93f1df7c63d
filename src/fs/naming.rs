//! Filename generation and manipulation.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::media::classify::url_file_name;

/// Longest full path, in characters, a destination may have.
pub const MAX_PATH_CHARS: usize = 255;

/// Longest file name, in bytes, most filesystems accept.
pub const MAX_NAME_BYTES: usize = 255;

/// Extension used when the URL does not reveal one.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Longest extension taken from a URL before it is considered garbage.
const MAX_EXTENSION_CHARS: usize = 5;

/// Sanitize a remote name so it is safe as a single path component.
///
/// Separators, reserved characters and control characters become `_`, and
/// runs of dots collapse so the result can never climb out of its directory.
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '%' | '#' => '_',
            c if c.is_control() || c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    let mut sanitized = String::with_capacity(replaced.len());
    for c in replaced.chars() {
        if c == '.' && sanitized.ends_with('.') {
            continue;
        }
        sanitized.push(c);
    }

    sanitized.trim_matches('.').to_string()
}

/// Split a remote file name into a sanitized stem and a lowercase extension.
fn split_name(name: &str) -> (String, String) {
    let (stem, ext) = match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos + 1..]),
        _ => (name, ""),
    };

    let ext = ext.to_ascii_lowercase();
    let ext = if !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_CHARS
        && ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        ext
    } else {
        DEFAULT_EXTENSION.to_string()
    };

    (sanitize_component(stem), ext)
}

/// Destination for an image: `{dir}/{postId}_{name}.{ext}`.
///
/// The name part is truncated (never the post id or extension) so the whole
/// path stays within [`MAX_PATH_CHARS`] characters and the file name within
/// [`MAX_NAME_BYTES`] bytes.
pub fn destination_path(dir: &Path, post_id: &str, url: &str) -> Result<PathBuf> {
    let post_id = sanitize_component(post_id);
    if post_id.is_empty() {
        return Err(Error::InvalidFilename(format!(
            "Post id is empty after sanitizing (url: {})",
            url
        )));
    }

    let original = url_file_name(url).unwrap_or_default();
    let (stem, ext) = split_name(&original);

    let dir_chars = dir.to_string_lossy().chars().count();
    // separator + id + '_' + '.' + ext
    let fixed_chars = dir_chars + 1 + post_id.chars().count() + 1 + 1 + ext.len();
    // id + '_' + '.' + ext
    let fixed_bytes = post_id.len() + 1 + 1 + ext.len();
    if fixed_chars >= MAX_PATH_CHARS || fixed_bytes >= MAX_NAME_BYTES {
        return Err(Error::InvalidFilename(format!(
            "No room for a file name for post {} in {}",
            post_id,
            dir.display()
        )));
    }

    let char_budget = MAX_PATH_CHARS - fixed_chars;
    let byte_budget = MAX_NAME_BYTES - fixed_bytes;
    let mut truncated = String::new();
    for c in stem.chars().take(char_budget) {
        if truncated.len() + c.len_utf8() > byte_budget {
            break;
        }
        truncated.push(c);
    }

    if truncated.is_empty() {
        let fallback = format!("{}_image.{}", post_id, ext);
        if dir_chars + 1 + fallback.len() <= MAX_PATH_CHARS && fallback.len() <= MAX_NAME_BYTES {
            return Ok(dir.join(fallback));
        }
        return Ok(dir.join(format!("{}.{}", post_id, ext)));
    }

    Ok(dir.join(format!("{}_{}.{}", post_id, truncated, ext)))
}
