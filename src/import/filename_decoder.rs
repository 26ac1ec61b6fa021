//! Decodes catalog fields from file names of the form
//! `name_author_publisher_genre.ext`.
//!
//! The grammar is deliberately literal: segments are split on `_`, nothing is
//! trimmed or case-folded, and only a known extension is removed from the
//! genre segment. Anything after the fourth segment is ignored.

/// Extensions stripped from the genre segment (exact, case-sensitive).
/// `.docx` must come before `.doc`.
const KNOWN_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".doc", ".mp3", ".wav", ".flac"];

const SEPARATOR: char = '_';
const REQUIRED_SEGMENTS: usize = 4;

/// Fields carried by a well-formed file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogFields {
    pub name: String,
    pub author: String,
    pub publisher: String,
    pub genre: String,
}

/// Result of decoding a file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFilename {
    Decoded(CatalogFields),
    /// Too few segments; the caller skips the file and counts it
    Malformed { reason: String },
}

/// Decode a bare file name (no directory components)
pub fn decode_filename(file_name: &str) -> DecodedFilename {
    let segments: Vec<&str> = file_name.split(SEPARATOR).collect();
    if segments.len() < REQUIRED_SEGMENTS {
        return DecodedFilename::Malformed {
            reason: format!(
                "expected at least {} '{}'-separated segments, found {}",
                REQUIRED_SEGMENTS,
                SEPARATOR,
                segments.len()
            ),
        };
    }

    DecodedFilename::Decoded(CatalogFields {
        name: segments[0].to_string(),
        author: segments[1].to_string(),
        publisher: segments[2].to_string(),
        genre: strip_known_extension(segments[3]).to_string(),
    })
}

fn strip_known_extension(segment: &str) -> &str {
    KNOWN_EXTENSIONS
        .iter()
        .find_map(|ext| segment.strip_suffix(ext))
        .unwrap_or(segment)
}
