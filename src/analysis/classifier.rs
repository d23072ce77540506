//! Content sniffing from the first bytes of a file.
//!
//! Pure and stateless: a static table of magic-number signatures. Absence of
//! a match is the common case (plain text, source code) and yields the
//! `"untyped"` label, not an error.

use serde::Serialize;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Bytes needed to recognise every signature below (the tar marker reaches 261)
pub const HEAD_LEN: usize = 261;

/// Label for content that matches no known signature
pub const UNTYPED: &str = "untyped";

/// A recognised content type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileKind {
    pub mime: &'static str,
    pub extension: &'static str,
}

struct Signature {
    mime: &'static str,
    extension: &'static str,
    matches: fn(&[u8]) -> bool,
}

fn at(head: &[u8], offset: usize, magic: &[u8]) -> bool {
    head.get(offset..offset + magic.len()) == Some(magic)
}

fn riff(head: &[u8], form: &[u8; 4]) -> bool {
    head.starts_with(b"RIFF") && at(head, 8, form)
}

fn ftyp(head: &[u8], brands: &[&[u8; 4]]) -> bool {
    at(head, 4, b"ftyp") && brands.iter().any(|brand| at(head, 8, *brand))
}

// Order matters where signatures overlap (RIFF, ftyp, zip-based formats).
#[rustfmt::skip]
const SIGNATURES: &[Signature] = &[
    // Images
    Signature { mime: "image/png", extension: "png", matches: |h| h.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) },
    Signature { mime: "image/jpeg", extension: "jpg", matches: |h| h.starts_with(&[0xFF, 0xD8, 0xFF]) },
    Signature { mime: "image/gif", extension: "gif", matches: |h| h.starts_with(b"GIF87a") || h.starts_with(b"GIF89a") },
    Signature { mime: "image/webp", extension: "webp", matches: |h| riff(h, b"WEBP") },
    Signature { mime: "image/bmp", extension: "bmp", matches: |h| h.starts_with(b"BM") && h.len() >= 14 },
    Signature { mime: "image/tiff", extension: "tif", matches: |h| h.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || h.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]) },
    Signature { mime: "image/vnd.microsoft.icon", extension: "ico", matches: |h| h.starts_with(&[0x00, 0x00, 0x01, 0x00]) },
    Signature { mime: "image/vnd.adobe.photoshop", extension: "psd", matches: |h| h.starts_with(b"8BPS") },
    Signature { mime: "image/heif", extension: "heif", matches: |h| ftyp(h, &[b"heic", b"heix", b"mif1"]) },
    // Audio
    Signature { mime: "audio/mpeg", extension: "mp3", matches: |h| h.starts_with(b"ID3") || h.starts_with(&[0xFF, 0xFB]) },
    Signature { mime: "audio/x-flac", extension: "flac", matches: |h| h.starts_with(b"fLaC") },
    Signature { mime: "audio/ogg", extension: "ogg", matches: |h| h.starts_with(b"OggS") },
    Signature { mime: "audio/x-wav", extension: "wav", matches: |h| riff(h, b"WAVE") },
    Signature { mime: "audio/midi", extension: "mid", matches: |h| h.starts_with(b"MThd") },
    Signature { mime: "audio/x-m4a", extension: "m4a", matches: |h| ftyp(h, &[b"M4A "]) },
    // Video
    Signature { mime: "video/quicktime", extension: "mov", matches: |h| ftyp(h, &[b"qt  "]) },
    Signature { mime: "video/mp4", extension: "mp4", matches: |h| ftyp(h, &[b"isom", b"iso2", b"mp41", b"mp42", b"avc1", b"dash", b"MSNV"]) },
    Signature { mime: "video/x-msvideo", extension: "avi", matches: |h| riff(h, b"AVI ") },
    Signature { mime: "video/x-matroska", extension: "mkv", matches: |h| h.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]) },
    // Archives
    Signature { mime: "application/zip", extension: "zip", matches: |h| h.starts_with(&[b'P', b'K', 0x03, 0x04]) || h.starts_with(&[b'P', b'K', 0x05, 0x06]) },
    Signature { mime: "application/x-tar", extension: "tar", matches: |h| at(h, 257, b"usta") },
    Signature { mime: "application/gzip", extension: "gz", matches: |h| h.starts_with(&[0x1F, 0x8B, 0x08]) },
    Signature { mime: "application/x-bzip2", extension: "bz2", matches: |h| h.starts_with(b"BZh") },
    Signature { mime: "application/x-xz", extension: "xz", matches: |h| h.starts_with(&[0xFD, b'7', b'z', b'X', b'Z', 0x00]) },
    Signature { mime: "application/zstd", extension: "zst", matches: |h| h.starts_with(&[0x28, 0xB5, 0x2F, 0xFD]) },
    Signature { mime: "application/x-7z-compressed", extension: "7z", matches: |h| h.starts_with(&[b'7', b'z', 0xBC, 0xAF, 0x27, 0x1C]) },
    Signature { mime: "application/vnd.rar", extension: "rar", matches: |h| h.starts_with(b"Rar!\x1A\x07") },
    // Documents
    Signature { mime: "application/pdf", extension: "pdf", matches: |h| h.starts_with(b"%PDF") },
    Signature { mime: "application/rtf", extension: "rtf", matches: |h| h.starts_with(b"{\\rtf") },
    Signature { mime: "application/vnd.sqlite3", extension: "sqlite", matches: |h| h.starts_with(b"SQLite format 3\0") },
    // Fonts
    Signature { mime: "font/woff", extension: "woff", matches: |h| h.starts_with(b"wOFF") },
    Signature { mime: "font/woff2", extension: "woff2", matches: |h| h.starts_with(b"wOF2") },
    Signature { mime: "font/otf", extension: "otf", matches: |h| h.starts_with(b"OTTO") },
    Signature { mime: "font/ttf", extension: "ttf", matches: |h| h.starts_with(&[0x00, 0x01, 0x00, 0x00, 0x00]) },
    // Executables
    Signature { mime: "application/x-executable", extension: "elf", matches: |h| h.starts_with(&[0x7F, b'E', b'L', b'F']) },
    Signature { mime: "application/vnd.microsoft.portable-executable", extension: "exe", matches: |h| h.starts_with(b"MZ") },
    Signature { mime: "application/wasm", extension: "wasm", matches: |h| h.starts_with(&[0x00, b'a', b's', b'm']) },
    Signature { mime: "application/java-vm", extension: "class", matches: |h| h.starts_with(&[0xCA, 0xFE, 0xBA, 0xBE]) },
];

/// Detect the content type from a file's head bytes
pub fn detect(head: &[u8]) -> Option<FileKind> {
    SIGNATURES
        .iter()
        .find(|signature| (signature.matches)(head))
        .map(|signature| FileKind {
            mime: signature.mime,
            extension: signature.extension,
        })
}

/// MIME-like label for the head bytes, or `"untyped"`
pub fn classify(head: &[u8]) -> &'static str {
    detect(head).map_or(UNTYPED, |kind| kind.mime)
}

/// Read at most `HEAD_LEN` bytes from the start of a file
pub fn read_head(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut head = Vec::with_capacity(HEAD_LEN);
    file.take(HEAD_LEN as u64).read_to_end(&mut head)?;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_detect_images() {
        assert_eq!(classify(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0]), "image/png");
        assert_eq!(classify(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(classify(b"GIF89a....."), "image/gif");
        assert_eq!(classify(b"RIFF\x00\x00\x00\x00WEBPVP8 "), "image/webp");
    }

    #[test]
    fn test_riff_subtypes_are_distinguished() {
        assert_eq!(classify(b"RIFF\x24\x00\x00\x00WAVEfmt "), "audio/x-wav");
        assert_eq!(classify(b"RIFF\x24\x00\x00\x00AVI LIST"), "video/x-msvideo");
        assert_eq!(classify(b"RIFF\x24\x00\x00\x00XXXX"), UNTYPED);
    }

    #[test]
    fn test_ftyp_brands() {
        assert_eq!(classify(b"\x00\x00\x00\x18ftypisom\x00\x00\x02\x00"), "video/mp4");
        assert_eq!(classify(b"\x00\x00\x00\x18ftypqt  \x00\x00\x02\x00"), "video/quicktime");
        assert_eq!(classify(b"\x00\x00\x00\x18ftypheic\x00\x00\x00\x00"), "image/heif");
    }

    #[test]
    fn test_tar_marker_needs_full_head() {
        let mut head = vec![0u8; HEAD_LEN];
        head[257..261].copy_from_slice(b"usta");
        assert_eq!(classify(&head), "application/x-tar");
        // Truncated head cannot reach the marker
        assert_eq!(classify(&head[..260]), UNTYPED);
    }

    #[test]
    fn test_text_and_empty_are_untyped() {
        assert_eq!(classify(b"Hello, World!\n"), UNTYPED);
        assert_eq!(classify(b"fn main() {}"), UNTYPED);
        assert_eq!(classify(&[]), UNTYPED);
        assert!(detect(b"plain").is_none());
    }

    #[test]
    fn test_detect_reports_extension() {
        let kind = detect(b"%PDF-1.7\n").unwrap();
        assert_eq!(kind.mime, "application/pdf");
        assert_eq!(kind.extension, "pdf");
    }

    #[test]
    fn test_read_head_is_capped() {
        let dir = tempdir().unwrap();
        let big = dir.path().join("big.bin");
        fs::write(&big, vec![7u8; 4096]).unwrap();
        let small = dir.path().join("small.txt");
        fs::write(&small, "abc").unwrap();

        assert_eq!(read_head(&big).unwrap().len(), HEAD_LEN);
        assert_eq!(read_head(&small).unwrap(), b"abc");
        assert!(read_head(&dir.path().join("missing")).is_err());
    }
}
