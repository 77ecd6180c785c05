/// Longest filename offered to a client, extension included
pub const MAX_FILENAME_CHARS: usize = 120;

/// File extension for a media content type, ignoring any parameters.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => "m4a",
        "audio/webm" | "video/webm" => "webm",
        "audio/mpeg" => "mp3",
        "audio/ogg" => "ogg",
        "audio/aac" => "aac",
        "audio/flac" => "flac",
        "video/mp4" => "mp4",
        _ => "bin",
    }
}

/// Reduce `name` to a safe ASCII filename, or `None` if nothing usable is left.
///
/// Keeps ASCII letters, digits, spaces and `-_.()`; whitespace runs collapse
/// to one space and leading dots are stripped.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let kept: String = name
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '(' | ')'))
        .collect();
    let collapsed = kept.split_whitespace().collect::<Vec<_>>().join(" ");
    let trimmed = collapsed.trim_start_matches(['.', ' ']).trim_end();

    if trimmed.chars().any(|c| c.is_ascii_alphanumeric()) {
        Some(trimmed.to_string())
    } else {
        None
    }
}

/// Download filename for `id`, built from the suggested name when usable.
pub fn download_filename(suggested: Option<&str>, id: &str, content_type: &str) -> String {
    let ext = extension_for(content_type);
    let stem = suggested
        .and_then(sanitize_filename)
        .or_else(|| sanitize_filename(id))
        .unwrap_or_else(|| "media".to_string());

    let suffix = format!(".{ext}");
    let stem = match stem.to_ascii_lowercase().ends_with(&suffix) {
        true => &stem[..stem.len() - suffix.len()],
        false => stem.as_str(),
    };
    // Sanitized names are ASCII, so byte and char lengths agree.
    let stem = stem[..stem.len().min(MAX_FILENAME_CHARS - suffix.len())].trim_end();
    let stem = if stem.is_empty() { "media" } else { stem };

    format!("{stem}{suffix}")
}

/// `Content-Disposition` value for a download
pub fn attachment(filename: &str) -> String {
    format!("attachment; filename=\"{filename}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("audio/webm; codecs=\"opus\""), "webm");
        assert_eq!(extension_for("Audio/MP4"), "m4a");
        assert_eq!(extension_for("audio/mpeg"), "mp3");
        assert_eq!(extension_for("video/mp4"), "mp4");
        assert_eq!(extension_for("application/x-mpegurl"), "bin");
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("My Song (Live)").as_deref(), Some("My Song (Live)"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("etcpasswd"));
        assert_eq!(sanitize_filename("a\"b\r\nc").as_deref(), Some("ab c"));
        assert_eq!(sanitize_filename("日本語").as_deref(), None);
        assert_eq!(sanitize_filename("...").as_deref(), None);
    }

    #[test]
    fn test_download_filename() {
        assert_eq!(download_filename(Some("Track"), "abc", "audio/webm"), "Track.webm");
        assert_eq!(download_filename(Some("Track.webm"), "abc", "audio/webm"), "Track.webm");
        assert_eq!(download_filename(None, "abc", "audio/mp4"), "abc.m4a");
        assert_eq!(download_filename(Some("日本語"), "abc", "audio/mpeg"), "abc.mp3");

        let long = download_filename(Some(&"x".repeat(500)), "abc", "audio/webm");
        assert_eq!(long.len(), MAX_FILENAME_CHARS);
        assert!(long.ends_with(".webm"));
    }

    #[test]
    fn test_attachment_header_is_quoted() {
        assert_eq!(attachment("a b.mp3"), "attachment; filename=\"a b.mp3\"");
    }
}
