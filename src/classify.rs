//! Small keyword classifier for mixed event sources (Devpost and LabLab
//! list hackathons and competitions on the same page). Pure function of
//! the title text; hackathon keywords win ties.

use serde::Serialize;

const HACKATHON_KEYWORDS: &[&str] = &["hackathon", "hack"];
const COMPETITION_KEYWORDS: &[&str] = &["competition", "contest", "challenge"];

/// Classifier output for a mixed event source. `Unknown` records are
/// dropped before normalization; callers log the drop count per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventClass {
    Hackathon,
    Competition,
    Unknown,
}

/// Lowercase containment check against the curated keyword sets.
/// Hackathon keywords are checked first, so "Hackathon Challenge 2024"
/// classifies as a hackathon.
pub fn classify_title(title: &str) -> EventClass {
    let t = title.to_lowercase();
    if HACKATHON_KEYWORDS.iter().any(|k| t.contains(k)) {
        return EventClass::Hackathon;
    }
    if COMPETITION_KEYWORDS.iter().any(|k| t.contains(k)) {
        return EventClass::Competition;
    }
    EventClass::Unknown
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_table_matches() {
        assert_eq!(classify_title("AI Hackathon 2026"), EventClass::Hackathon);
        assert_eq!(classify_title("HackMIT"), EventClass::Hackathon);
        assert_eq!(classify_title("Robotics Challenge"), EventClass::Competition);
        assert_eq!(classify_title("Kaggle Contest"), EventClass::Competition);
        assert_eq!(classify_title("Data Science Competition"), EventClass::Competition);
        assert_eq!(classify_title("Intro to Rust Webinar"), EventClass::Unknown);
    }

    #[test]
    fn hackathon_wins_tie_break() {
        assert_eq!(
            classify_title("Hackathon Challenge 2024"),
            EventClass::Hackathon
        );
    }

    #[test]
    fn containment_is_case_insensitive() {
        assert_eq!(classify_title("MEGA HACKATHON"), EventClass::Hackathon);
        assert_eq!(classify_title("coding CONTEST"), EventClass::Competition);
    }
}
