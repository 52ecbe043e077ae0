// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use url::Url;

use crate::error::ExtensionError;
use crate::http::HttpClient;

/// Used when a title sanitizes down to nothing
const UNTITLED: &str = "untitled";

/// Extensions accepted straight from a URL path
const KNOWN_EXTENSIONS: &[&str] = &[
    // Audio
    "aac", "mp3", "mp4", "wav", "m4a", "aiff", "ogg", "opus", "flac",
    // Image
    "bmp", "heic", "jpg", "jpeg", "png", "webp",
    // Text
    "xml",
];

/// Sanitize a feed or episode title for use as a file or directory name
///
/// Characters that are invalid in file names on common platforms are
/// removed, whitespace runs collapse to a single space.
pub fn sanitize_file_name(title: &str) -> String {
    let options = sanitize_filename::Options {
        replacement: "",
        ..Default::default()
    };
    let stripped = sanitize_filename::sanitize_with_options(title, options);
    let collapsed = collapse_whitespace(&stripped);

    if collapsed.is_empty() {
        UNTITLED.to_string()
    } else {
        collapsed
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Map MIME types to file extensions
pub fn mime_to_extension(mime: &str) -> Option<&'static str> {
    // Parameters such as "; charset=utf-8" are irrelevant
    let essence = mime.split(';').next().unwrap_or("").trim();

    match essence.to_lowercase().as_str() {
        "audio/aac" => Some("aac"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" => Some("mp4"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/x-m4a" | "audio/m4a" => Some("m4a"),
        "audio/x-aiff" => Some("aiff"),
        "audio/ogg" => Some("ogg"),
        "audio/opus" => Some("opus"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "image/bmp" => Some("bmp"),
        "image/heic" => Some("heic"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "text/xml" | "application/xml" | "application/rss+xml" => Some("xml"),
        _ => None,
    }
}

/// Extract a known extension from the last path segment of a URL
///
/// Query strings and fragments are ignored; the result is lower-cased.
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let filename = parsed.path_segments()?.next_back()?;
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_lowercase();

    KNOWN_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Determine the extension for a remote resource
///
/// The declared MIME type wins, then the URL path, and as a last resort
/// the Content-Type returned by a HEAD request.
pub async fn resolve_extension<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    declared_mime: Option<&str>,
) -> Result<String, ExtensionError> {
    if let Some(ext) = declared_mime.and_then(mime_to_extension) {
        return Ok(ext.to_string());
    }

    if let Some(ext) = extension_from_url(url) {
        return Ok(ext);
    }

    let content_type = client
        .content_type(url)
        .await
        .map_err(|e| ExtensionError::HeadRequestFailed {
            url: url.to_string(),
            source: e,
        })?;

    content_type
        .as_deref()
        .and_then(mime_to_extension)
        .map(String::from)
        .ok_or_else(|| ExtensionError::UnknownContentType {
            url: url.to_string(),
            content_type,
        })
}

/// File name for the enclosure at `index` of `count` enclosures
///
/// A single enclosure is named after the episode; several get a 1-based
/// `_N` suffix.
pub fn enclosure_file_name(safe_title: &str, ext: &str, index: usize, count: usize) -> String {
    if count == 1 {
        format!("{safe_title}.{ext}")
    } else {
        format!("{safe_title}_{}.{ext}", index + 1)
    }
}
