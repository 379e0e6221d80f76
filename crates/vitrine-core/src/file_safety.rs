//! Safety checks for media files imported into the catalog.
//!
//! An imported file is refused when it is empty or oversized, has a blocked
//! extension, or starts with the magic bytes of an executable. Content types
//! come from magic bytes; only text-based image formats are trusted by
//! extension.

use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Magic byte signatures for executable files
pub const EXECUTABLE_SIGNATURES: &[(&str, &[u8])] = &[
    ("Windows PE/MZ", &[0x4D, 0x5A]),
    ("ELF", &[0x7F, 0x45, 0x4C, 0x46]),
    ("Mach-O 32", &[0xFE, 0xED, 0xFA, 0xCE]),
    ("Mach-O 64", &[0xFE, 0xED, 0xFA, 0xCF]),
    ("Mach-O Fat or Java Class", &[0xCA, 0xFE, 0xBA, 0xBE]),
    ("WebAssembly", &[0x00, 0x61, 0x73, 0x6D]),
];

/// Blocked file extensions (case-insensitive)
static BLOCKED_EXTENSIONS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "exe", "dll", "scr", "pif", "com", "msi", "so", "dylib", "jar", "class", "deb", "rpm",
        "apk", "app", "dmg", "pkg", "reg", "lnk", "hta", "php", "phtml", "js", "sh", "bat",
    ]
    .into_iter()
    .collect()
});

/// Outcome of checking a media file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaCheck {
    Allowed { content_type: String },
    Blocked { reason: String },
}

impl MediaCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, MediaCheck::Allowed { .. })
    }
}

/// Check a media file before it is stored.
pub fn check_media(filename: &str, data: &[u8], max_size_bytes: u64) -> MediaCheck {
    if data.is_empty() {
        return MediaCheck::Blocked {
            reason: "File is empty".to_string(),
        };
    }

    if data.len() as u64 > max_size_bytes {
        return MediaCheck::Blocked {
            reason: format!("File exceeds maximum size of {} bytes", max_size_bytes),
        };
    }

    if let Some(ext) = extension(filename) {
        if BLOCKED_EXTENSIONS.contains(ext.as_str()) {
            return MediaCheck::Blocked {
                reason: format!("File extension .{} is not allowed", ext),
            };
        }
    }

    for (name, magic) in EXECUTABLE_SIGNATURES {
        if data.starts_with(magic) {
            return MediaCheck::Blocked {
                reason: format!("Executable file detected: {}", name),
            };
        }
    }

    MediaCheck::Allowed {
        content_type: detect_media_type(filename, data),
    }
}

/// Detect the content type of a media file.
///
/// Magic bytes win; SVG is recognised by extension because it has none.
/// Everything else is `application/octet-stream`.
pub fn detect_media_type(filename: &str, data: &[u8]) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }
    match extension(filename).as_deref() {
        Some("svg") => "image/svg+xml".to_string(),
        _ => "application/octet-stream".to_string(),
    }
}

fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Sanitize filename for safe storage
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return "unnamed_file".to_string();
    }

    // 255 characters, extension preserved
    if sanitized.chars().count() > 255 {
        let (stem, ext) = match sanitized.rfind('.') {
            Some(pos) => (&sanitized[..pos], &sanitized[pos..]),
            None => (sanitized, ""),
        };
        let keep = 255usize.saturating_sub(ext.chars().count());
        let stem: String = stem.chars().take(keep).collect();
        return format!("{}{}", stem, ext);
    }

    sanitized.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG: [u8; 10] = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

    #[test]
    fn test_png_is_allowed_with_detected_type() {
        let check = check_media("photo.png", &PNG, 1024);
        assert_eq!(
            check,
            MediaCheck::Allowed {
                content_type: "image/png".to_string()
            }
        );
    }

    #[test]
    fn test_magic_bytes_override_extension() {
        assert_eq!(detect_media_type("photo.txt", &JPEG), "image/jpeg");
    }

    #[test]
    fn test_svg_by_extension() {
        assert_eq!(detect_media_type("logo.SVG", b"<svg/>"), "image/svg+xml");
    }

    #[test]
    fn test_unknown_content_is_octet_stream() {
        assert_eq!(
            detect_media_type("blob.jpg", b"not really a jpeg"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_empty_file_blocked() {
        assert!(!check_media("a.png", &[], 1024).is_allowed());
    }

    #[test]
    fn test_oversized_file_blocked() {
        let check = check_media("a.png", &PNG, 4);
        assert!(matches!(check, MediaCheck::Blocked { reason } if reason.contains("maximum size")));
    }

    #[test]
    fn test_blocked_extension() {
        let check = check_media("payload.EXE", &PNG, 1024);
        assert!(matches!(check, MediaCheck::Blocked { reason } if reason.contains(".exe")));
    }

    #[test]
    fn test_executable_magic_blocked() {
        let elf = [0x7F, 0x45, 0x4C, 0x46, 0x02, 0x01];
        let check = check_media("innocent.png", &elf, 1024);
        assert!(matches!(check, MediaCheck::Blocked { reason } if reason.contains("ELF")));
    }

    #[test]
    fn test_sanitize_strips_path_and_specials() {
        assert_eq!(sanitize_filename("../../etc/pa:ss?.jpg"), "pa_ss_.jpg");
        assert_eq!(sanitize_filename("C:\\photos\\beach.jpg"), "beach.jpg");
        assert_eq!(sanitize_filename("   "), "unnamed_file");
    }

    #[test]
    fn test_sanitize_truncates_preserving_extension() {
        let long = format!("{}.jpeg", "a".repeat(300));
        let out = sanitize_filename(&long);
        assert_eq!(out.chars().count(), 255);
        assert!(out.ends_with(".jpeg"));
    }
}
