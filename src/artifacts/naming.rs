//! Artifact filename derivation

use crate::types::JobId;

const MAX_TITLE_CHARS: usize = 80;
const MAX_EXTENSION_CHARS: usize = 10;
const FALLBACK_TITLE: &str = "media";
const FALLBACK_EXTENSION: &str = "bin";

/// Make a title safe to embed in a filename
///
/// Path separators, reserved characters and whitespace runs become a single
/// underscore; control characters are dropped. Never returns an empty string.
pub fn sanitize_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_sep = false;
    for c in title.chars() {
        if c.is_control() {
            continue;
        }
        let replace = c.is_whitespace()
            || matches!(c, '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0');
        if replace {
            pending_sep = !out.is_empty();
            continue;
        }
        if pending_sep {
            out.push('_');
            pending_sep = false;
        }
        out.push(c);
    }

    let trimmed: String = out
        .trim_matches(|c: char| c == '.' || c == '_')
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect();
    let trimmed = trimmed.trim_end_matches(['.', '_']);
    if trimmed.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        trimmed.to_string()
    }
}

fn sanitize_extension(ext: Option<&str>) -> String {
    let ext: String = ext
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(MAX_EXTENSION_CHARS)
        .collect::<String>()
        .to_ascii_lowercase();
    if ext.is_empty() {
        FALLBACK_EXTENSION.to_string()
    } else {
        ext
    }
}

/// Filename for the `seq`-th artifact of a job:
/// `<job-id-prefix>-<seq>_<sanitized-title>.<ext>`
pub fn artifact_filename(id: JobId, seq: usize, title: &str, extension: Option<&str>) -> String {
    format!(
        "{}-{}_{}.{}",
        id.prefix(),
        seq,
        sanitize_title(title),
        sanitize_extension(extension)
    )
}

/// Whether a requested filename can name a stored artifact at all
///
/// Rejects anything that could escape the download directory.
pub fn is_plain_filename(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}

/// MIME type for an artifact extension
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "flv" => "video/x-flv",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "wav" => "audio/wav",
        "ogg" | "opus" => "audio/ogg",
        "flac" => "audio/flac",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
