//! # List Screening
//!
//! Matches a subject against sanction and PEP entries. Each entry scores
//! its best name-or-alias similarity; when both sides carry a date of
//! birth, the score becomes `0.8 × name + 0.2 × [dates equal]`. Entries at
//! or above the record threshold are kept, strongest first, and the
//! subject matches when the strongest reaches the match threshold.

use serde::{Deserialize, Serialize};

use lce_core::{EntityData, LceError, LceResult};

use crate::config::MatchThresholds;
use crate::reference::{PepEntry, SanctionEntry};
use crate::similarity::best_similarity;

const NAME_FIELDS: [&str; 2] = ["full_name", "name"];
const DOB_FIELD: &str = "date_of_birth";

const NAME_WEIGHT: f64 = 0.8;
const DOB_WEIGHT: f64 = 0.2;

/// The person being screened.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    /// Full name.
    pub name: String,
    /// Date of birth, if known.
    pub date_of_birth: Option<String>,
}

impl Subject {
    /// Read the subject from entity data (`full_name` or `name`, and
    /// optionally `date_of_birth`).
    pub fn from_entity(data: &EntityData) -> LceResult<Self> {
        let name = NAME_FIELDS
            .iter()
            .find_map(|f| data.text_opt(f))
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| LceError::validation("full_name is required for screening"))?;
        Ok(Self {
            name: name.to_string(),
            date_of_birth: data
                .text_opt(DOB_FIELD)
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        })
    }
}

/// A reference entry in screenable form.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Entry identifier.
    pub entry_id: &'a str,
    /// Primary name.
    pub name: &'a str,
    /// Aliases.
    pub aliases: &'a [String],
    /// Date of birth.
    pub date_of_birth: Option<&'a str>,
}

impl<'a> From<&'a SanctionEntry> for Candidate<'a> {
    fn from(e: &'a SanctionEntry) -> Self {
        Self {
            entry_id: &e.entry_id,
            name: &e.name,
            aliases: &e.aliases,
            date_of_birth: e.date_of_birth.as_deref(),
        }
    }
}

impl<'a> From<&'a PepEntry> for Candidate<'a> {
    fn from(e: &'a PepEntry) -> Self {
        Self {
            entry_id: &e.entry_id,
            name: &e.name,
            aliases: &e.aliases,
            date_of_birth: e.date_of_birth.as_deref(),
        }
    }
}

/// One recorded match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenMatch {
    /// Matched entry.
    pub entry_id: String,
    /// The entry name or alias that matched best.
    pub matched_name: String,
    /// Name similarity alone.
    pub name_score: f64,
    /// Whether both dates of birth were present and equal.
    pub date_of_birth_match: Option<bool>,
    /// Final confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Outcome of screening against one list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScreenResult {
    /// Whether the strongest match reached the match threshold.
    pub is_match: bool,
    /// Strongest confidence among recorded matches, 0 without any.
    pub max_confidence: f64,
    /// Recorded matches, strongest first.
    pub matches: Vec<ScreenMatch>,
    /// Number of entries screened.
    pub entries_screened: usize,
}

impl ScreenResult {
    /// The confidence that counts toward the overall score: the maximum
    /// when matched, otherwise 0.
    pub fn counted_confidence(&self) -> f64 {
        if self.is_match {
            self.max_confidence
        } else {
            0.0
        }
    }
}

fn score(subject: &Subject, candidate: &Candidate<'_>) -> Option<ScreenMatch> {
    let names = std::iter::once(candidate.name).chain(candidate.aliases.iter().map(String::as_str));
    let (name_score, matched) = best_similarity(&subject.name, names)?;
    let (confidence, dob_match) = match (subject.date_of_birth.as_deref(), candidate.date_of_birth) {
        (Some(a), Some(b)) => {
            let equal = a.trim() == b.trim();
            let bonus = if equal { DOB_WEIGHT } else { 0.0 };
            (name_score * NAME_WEIGHT + bonus, Some(equal))
        }
        _ => (name_score, None),
    };
    Some(ScreenMatch {
        entry_id: candidate.entry_id.to_string(),
        matched_name: matched.to_string(),
        name_score,
        date_of_birth_match: dob_match,
        confidence: confidence.clamp(0.0, 1.0),
    })
}

/// Screen `subject` against `candidates`.
pub fn screen<'a>(
    subject: &Subject,
    candidates: impl IntoIterator<Item = Candidate<'a>>,
    thresholds: MatchThresholds,
) -> ScreenResult {
    let mut screened = 0;
    let mut matches: Vec<ScreenMatch> = candidates
        .into_iter()
        .inspect(|_| screened += 1)
        .filter_map(|c| score(subject, &c))
        .filter(|m| m.confidence >= thresholds.record)
        .collect();
    matches.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.entry_id.cmp(&b.entry_id))
    });
    let max_confidence = matches.first().map_or(0.0, |m| m.confidence);
    ScreenResult {
        is_match: max_confidence >= thresholds.is_match,
        max_confidence,
        matches,
        entries_screened: screened,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SANCTION: MatchThresholds = MatchThresholds {
        record: 0.7,
        is_match: 0.8,
    };

    fn entry(id: &str, name: &str, dob: Option<&str>) -> SanctionEntry {
        SanctionEntry {
            entry_id: id.into(),
            name: name.into(),
            aliases: vec![],
            date_of_birth: dob.map(str::to_string),
            list: "TEST".into(),
            program: None,
            country: None,
        }
    }

    fn subject(name: &str, dob: Option<&str>) -> Subject {
        Subject {
            name: name.into(),
            date_of_birth: dob.map(str::to_string),
        }
    }

    #[test]
    fn exact_name_matches() {
        let list = [entry("S1", "Ivan Petrov", None), entry("S2", "Anna Schmidt", None)];
        let r = screen(&subject("ivan petrov", None), list.iter().map(Candidate::from), SANCTION);
        assert!(r.is_match);
        assert_eq!(r.matches.len(), 1);
        assert_eq!(r.matches[0].entry_id, "S1");
        assert_eq!(r.entries_screened, 2);
    }

    #[test]
    fn near_name_recorded_but_not_matched() {
        // 3 edits over 12 characters: 0.75.
        let list = [entry("S1", "ivan petrova", None)];
        let r = screen(&subject("ivxn pxtrovx", None), list.iter().map(Candidate::from), SANCTION);
        assert_eq!(r.matches.len(), 1);
        assert!(!r.is_match);
        assert_eq!(r.counted_confidence(), 0.0);
    }

    #[test]
    fn date_of_birth_blends_in() {
        let list = [entry("S1", "Ivan Petrov", Some("1970-01-01"))];
        let same = screen(
            &subject("Ivan Petrov", Some("1970-01-01")),
            list.iter().map(Candidate::from),
            SANCTION,
        );
        assert_eq!(same.max_confidence, 1.0);
        assert_eq!(same.matches[0].date_of_birth_match, Some(true));

        let differ = screen(
            &subject("Ivan Petrov", Some("1981-06-30")),
            list.iter().map(Candidate::from),
            SANCTION,
        );
        assert!((differ.max_confidence - 0.8).abs() < 1e-12);
        assert!(differ.is_match);
    }

    #[test]
    fn aliases_are_screened() {
        let mut e = entry("S1", "Abu Example", None);
        e.aliases = vec!["John Sample".into()];
        let list = [e];
        let r = screen(&subject("John Sample", None), list.iter().map(Candidate::from), SANCTION);
        assert!(r.is_match);
        assert_eq!(r.matches[0].matched_name, "John Sample");
    }

    #[test]
    fn subject_requires_a_name() {
        assert!(Subject::from_entity(&EntityData::new().with("date_of_birth", "1970-01-01")).is_err());
        let s = Subject::from_entity(&EntityData::new().with("name", "A B")).unwrap();
        assert_eq!(s.name, "A B");
        assert_eq!(s.date_of_birth, None);
    }
}
