//! Normalized track identity.
//!
//! Two catalog entries for the same song (an album cut and its remaster,
//! say) must collapse to one identity for dedup purposes, while genuinely
//! different versions (a remix requested as such) stay distinct. The rules
//! live in a data table so the behavior is testable in one place.

use crate::catalog::TrackCandidate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Version markers stripped from titles during normalization. A bracketed
/// or dash-separated suffix containing one of these words is edition noise:
/// both editions collapse to the same signature. Suffixes without any
/// marker ("Part II", "Reprise") name a semantically different song and
/// are kept.
pub const VERSION_MARKERS: &[&str] = &[
    "live",
    "remix",
    "mix",
    "remaster",
    "remastered",
    "re-recorded",
    "anniversary",
    "deluxe",
    "edition",
    "version",
    "edit",
    "mono",
    "stereo",
    "demo",
    "session",
    "bonus track",
    "expanded",
];

lazy_static! {
    static ref BRACKETED: Regex = Regex::new(r"[\(\[][^\)\]]*[\)\]]").unwrap();
    static ref DASH_SUFFIX: Regex = Regex::new(r"\s+-\s+.*$").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Normalize a track title for signature purposes.
///
/// Lowercases, strips bracketed or dash suffixes that consist of edition
/// noise, and collapses whitespace. Suffixes naming a semantically
/// different version ("Song (Acoustic)") are kept.
pub fn normalize_title(title: &str) -> String {
    let mut out = title.to_lowercase();

    // Strip every marker-bearing bracket group; groups naming a different
    // version are stepped over, not stopped at.
    let mut pos = 0;
    loop {
        let Some((start, end, is_marker)) = BRACKETED
            .find_at(&out, pos)
            .map(|m| (m.start(), m.end(), contains_marker(m.as_str(), VERSION_MARKERS)))
        else {
            break;
        };
        if is_marker {
            out.replace_range(start..end, " ");
            pos = start;
        } else {
            pos = end;
        }
    }

    if let Some(found) = DASH_SUFFIX.find(&out) {
        let suffix = &out[found.start()..found.end()];
        if contains_marker(suffix, VERSION_MARKERS) {
            out.truncate(found.start());
        }
    }

    WHITESPACE.replace_all(out.trim(), " ").into_owned()
}

/// Normalize an artist name: lowercase and fold diacritics, so "Beyoncé"
/// and "beyonce" compare equal.
pub fn normalize_artist(name: &str) -> String {
    name.to_lowercase().chars().map(fold_diacritic).collect()
}

/// Does a raw title carry one of the user-excluded version markers
/// ("remix", "live", ...)? Used by the identity-exclusion filter pass.
pub fn title_has_version_marker(title: &str, markers: &[String]) -> bool {
    let lower = title.to_lowercase();
    markers.iter().any(|m| lower.contains(&m.to_lowercase()))
}

fn contains_marker(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|m| text.contains(m))
}

fn fold_diacritic(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        'æ' => 'a',
        'œ' => 'o',
        'ß' => 's',
        other => other,
    }
}

/// Normalized `(artist, title)` identity, independent of catalog ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackSignature {
    artist: String,
    title: String,
}

const SIGNATURE_SEPARATOR: char = '\u{1f}';

impl TrackSignature {
    pub fn new(artist: &str, title: &str) -> Self {
        Self {
            artist: normalize_artist(artist),
            title: normalize_title(title),
        }
    }

    pub fn of(candidate: &TrackCandidate) -> Self {
        Self::new(candidate.primary_artist(), &candidate.title)
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Stable storage encoding (single string, unit-separator delimited).
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.artist, SIGNATURE_SEPARATOR, self.title)
    }

    pub fn decode(raw: &str) -> Option<Self> {
        let (artist, title) = raw.split_once(SIGNATURE_SEPARATOR)?;
        Some(Self {
            artist: artist.to_string(),
            title: title.to_string(),
        })
    }
}

impl std::fmt::Display for TrackSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {}", self.artist, self.title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaster_suffixes_collapse() {
        assert_eq!(
            normalize_title("Dreams - 2004 Remaster"),
            normalize_title("Dreams")
        );
        assert_eq!(
            normalize_title("Dreams (2004 Remastered)"),
            normalize_title("Dreams")
        );
        assert_eq!(
            normalize_title("Dreams [Deluxe Edition]"),
            normalize_title("dreams")
        );
    }

    #[test]
    fn test_marker_suffixes_collapse() {
        assert_eq!(normalize_title("Song (Club Remix)"), "song");
        assert_eq!(normalize_title("Song - Live at Wembley"), "song");
        assert_eq!(normalize_title("Song (Radio Edit)"), "song");
    }

    #[test]
    fn test_marker_brackets_collapse_past_kept_brackets() {
        // A kept group must not shield a later marker group.
        assert_eq!(normalize_title("Song (Acoustic) (Live)"), "song (acoustic)");
        assert_eq!(
            normalize_title("Song (Remastered) (Acoustic)"),
            "song (acoustic)"
        );
    }

    #[test]
    fn test_dash_suffix_with_inner_dash_collapses() {
        assert_eq!(normalize_title("Song - Re-recorded"), "song");
        assert_eq!(
            normalize_title("Song - Re-recorded"),
            normalize_title("Song (Re-recorded)")
        );
    }

    #[test]
    fn test_semantic_suffixes_stay_distinct() {
        // Suffixes that name a different song, not an edition of it.
        assert_ne!(normalize_title("Song (Part II)"), normalize_title("Song"));
        assert_ne!(normalize_title("Song (Reprise)"), normalize_title("Song"));
    }

    #[test]
    fn test_artist_diacritic_folding() {
        assert_eq!(normalize_artist("Beyoncé"), "beyonce");
        assert_eq!(normalize_artist("Motörhead"), "motorhead");
        assert_eq!(normalize_artist("SIGUR RÓS"), "sigur ros");
    }

    #[test]
    fn test_signature_equality() {
        let a = TrackSignature::new("Fleetwood Mac", "Dreams - 2004 Remaster");
        let b = TrackSignature::new("fleetwood mac", "Dreams");
        assert_eq!(a, b);
    }

    #[test]
    fn test_signature_encoding_roundtrip() {
        let sig = TrackSignature::new("Sade", "No Ordinary Love");
        let decoded = TrackSignature::decode(&sig.encode()).unwrap();
        assert_eq!(sig, decoded);
        assert!(TrackSignature::decode("no separator here").is_none());
    }

    #[test]
    fn test_version_marker_exclusion() {
        let markers = vec!["remix".to_string()];
        assert!(title_has_version_marker("Song (Club Remix)", &markers));
        assert!(title_has_version_marker("Song - Radio Remix", &markers));
        assert!(!title_has_version_marker("Song", &markers));
        assert!(!title_has_version_marker("Song", &[]));
    }
}
