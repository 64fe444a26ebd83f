// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PII scrubbing applied before content is embedded and stored

use regex::Regex;
use serde::Serialize;

/// Category of a redacted span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiKind {
    Email,
    Card,
    Aadhaar,
    Pan,
    Phone,
}

impl PiiKind {
    pub fn placeholder(&self) -> &'static str {
        match self {
            PiiKind::Email => "[REDACTED:email]",
            PiiKind::Card => "[REDACTED:card]",
            PiiKind::Aadhaar => "[REDACTED:aadhaar]",
            PiiKind::Pan => "[REDACTED:pan]",
            PiiKind::Phone => "[REDACTED:phone]",
        }
    }
}

/// Scrubbed text plus one entry per redacted span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrubResult {
    pub scrubbed: String,
    pub redactions: Vec<PiiKind>,
}

impl ScrubResult {
    pub fn pii_found(&self) -> bool {
        !self.redactions.is_empty()
    }
}

/// Removes personally identifiable information from free text
pub trait PiiScrubber: Send + Sync {
    fn scrub(&self, text: &str) -> ScrubResult;
}

/// Pattern-based scrubber tuned for marketplace listings and chat text
pub struct RegexPiiScrubber {
    // Applied in order. Card numbers run first so 16 digits are never split
    // into an Aadhaar match; phones run before Aadhaar so a `+91` prefixed
    // mobile is not read as 12 bare digits.
    patterns: Vec<(PiiKind, Regex)>,
}

impl RegexPiiScrubber {
    pub fn new() -> Result<Self, regex::Error> {
        let patterns = vec![
            (
                PiiKind::Email,
                Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")?,
            ),
            (
                PiiKind::Card,
                Regex::new(r"\b\d{4}[\s-]?\d{4}[\s-]?\d{4}[\s-]?\d{4}\b")?,
            ),
            (
                PiiKind::Phone,
                Regex::new(r"(?:\+91[\s-]?|\b0?)[6-9]\d{9}\b|\b\d{3}[-.\s]\d{3}[-.\s]\d{4}\b")?,
            ),
            (
                PiiKind::Aadhaar,
                Regex::new(r"\b[2-9]\d{3}[\s-]?\d{4}[\s-]?\d{4}\b")?,
            ),
            (PiiKind::Pan, Regex::new(r"\b[A-Z]{5}\d{4}[A-Z]\b")?),
        ];

        Ok(Self { patterns })
    }
}

impl PiiScrubber for RegexPiiScrubber {
    fn scrub(&self, text: &str) -> ScrubResult {
        let mut scrubbed = text.to_string();
        let mut redactions = Vec::new();

        for (kind, pattern) in &self.patterns {
            let hits = pattern.find_iter(&scrubbed).count();
            if hits == 0 {
                continue;
            }
            redactions.extend(std::iter::repeat(*kind).take(hits));
            scrubbed = pattern
                .replace_all(&scrubbed, kind.placeholder())
                .into_owned();
        }

        ScrubResult {
            scrubbed,
            redactions,
        }
    }
}
