/// Scan modes and per-page dispositions
use crate::storage::SourceRecord;
use std::fmt;

/// How a source is walked in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanMode {
    /// Walk from the seed and process every page unconditionally
    Full,

    /// Re-check the first W pages, then continue into unseen pages
    Incremental,
}

impl ScanMode {
    /// Picks the mode for a source: full when it was never crawled or a full
    /// scan is forced
    pub fn for_source(source: &SourceRecord, force_full: bool) -> Self {
        if force_full || source.never_crawled() {
            Self::Full
        } else {
            Self::Incremental
        }
    }

    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }

    /// Converts the mode to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }

    /// Parses a mode from its database string representation
    ///
    /// Returns None if the string doesn't match any known mode.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "incremental" => Some(Self::Incremental),
            _ => None,
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// What to do with a listing page once it has been fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageDisposition {
    // ===== Full scan =====
    /// Extract documents regardless of stored state
    Always,

    // ===== Incremental scan =====
    /// Inside the window: extract only when the fingerprint changed
    CheckFingerprint,

    /// Beyond the window: extract only pages without a stored record
    OnlyIfUnseen,
}

impl PageDisposition {
    /// Returns true for pages inside the re-scan window (or any full-scan page)
    pub fn is_window(&self) -> bool {
        matches!(self, Self::Always | Self::CheckFingerprint)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::CheckFingerprint => "check_fingerprint",
            Self::OnlyIfUnseen => "only_if_unseen",
        }
    }
}

impl fmt::Display for PageDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(last_crawled_at: Option<&str>) -> SourceRecord {
        SourceRecord {
            id: 1,
            name: "notices".to_string(),
            source_type: "generic".to_string(),
            seed_url: "https://example.gov/notices".to_string(),
            frontier_url: None,
            frontier_depth: 0,
            halted_url: None,
            last_full_scan_at: None,
            last_crawled_at: last_crawled_at.map(str::to_string),
        }
    }

    #[test]
    fn test_mode_for_new_source_is_full() {
        assert_eq!(ScanMode::for_source(&source(None), false), ScanMode::Full);
    }

    #[test]
    fn test_mode_for_crawled_source() {
        let crawled = source(Some("2024-05-01T10:00:00Z"));
        assert_eq!(ScanMode::for_source(&crawled, false), ScanMode::Incremental);
        assert_eq!(ScanMode::for_source(&crawled, true), ScanMode::Full);
    }

    #[test]
    fn test_db_string_roundtrip() {
        for mode in [ScanMode::Full, ScanMode::Incremental] {
            assert_eq!(ScanMode::from_db_string(mode.to_db_string()), Some(mode));
        }
        assert_eq!(ScanMode::from_db_string("partial"), None);
    }

    #[test]
    fn test_disposition_window() {
        assert!(PageDisposition::Always.is_window());
        assert!(PageDisposition::CheckFingerprint.is_window());
        assert!(!PageDisposition::OnlyIfUnseen.is_window());
        assert_eq!(PageDisposition::OnlyIfUnseen.to_string(), "only_if_unseen");
    }
}
