//! Deterministic fact extraction prepended to passage text.
//!
//! Times, dates and colour-coded container references are duplicated into a
//! searchable prefix so lexical matching can land on exact factual strings
//! without relying on the dense embedding to encode them.

use std::sync::OnceLock;

use regex::Regex;

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(\d{1,2}:\d{2}\s*(?:a\.m\.|p\.m\.|AM|PM))").expect("valid pattern")
    })
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b((?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2})\b",
        )
        .expect("valid pattern")
    })
}

fn transport_box_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b([A-Z]{2,})\s+Transport Box(?:\s+contains)?:?\s+([^.!?]+)")
            .expect("valid pattern")
    })
}

fn push_unique(items: &mut Vec<String>, value: String) {
    if !items.contains(&value) {
        items.push(value);
    }
}

/// Enumerate the fact lines found in one passage's raw text.
pub fn extract_facts(raw_content: &str) -> Vec<String> {
    let mut facts = Vec::new();

    let mut times: Vec<String> = Vec::new();
    for caps in time_re().captures_iter(raw_content) {
        push_unique(&mut times, caps[1].to_string());
    }
    if !times.is_empty() {
        facts.push(format!("Times mentioned: {}", times.join(", ")));
    }

    let mut dates: Vec<String> = Vec::new();
    for caps in date_re().captures_iter(raw_content) {
        push_unique(&mut dates, caps[1].to_string());
    }
    if !dates.is_empty() {
        facts.push(format!("Dates mentioned: {}", dates.join(", ")));
    }

    for caps in transport_box_re().captures_iter(raw_content) {
        push_unique(
            &mut facts,
            format!("{} Transport Box contains: {}", &caps[1], caps[2].trim()),
        );
    }

    facts
}

/// Build the fact-prefixed contextual form a passage is indexed under.
pub fn contextual_content(section_title: &str, raw_content: &str) -> String {
    let facts = extract_facts(raw_content);
    let fact_prefix = if facts.is_empty() {
        String::new()
    } else {
        format!("{} | ", facts.join(" | "))
    };
    format!("[{section_title}] {fact_prefix}{raw_content}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_are_collected_unique_in_order() {
        let facts = extract_facts("Polls open at 6:00 a.m. and close at 7:00 p.m. Arrive by 6:00 a.m. sharp.");
        assert_eq!(facts, vec!["Times mentioned: 6:00 a.m., 7:00 p.m."]);
    }

    #[test]
    fn dates_are_collected() {
        let facts = extract_facts("Early voting starts October 9 and ends November 1.");
        assert_eq!(facts, vec!["Dates mentioned: October 9, November 1"]);
    }

    #[test]
    fn transport_box_phrases_become_fact_lines() {
        let facts =
            extract_facts("At closing, the BLUE Transport Box contains: provisional ballots and envelopes. Seal it.");
        assert_eq!(
            facts,
            vec!["BLUE Transport Box contains: provisional ballots and envelopes"]
        );
    }

    #[test]
    fn contextual_content_prefixes_title_and_facts() {
        let ctx = contextual_content("Section 5: Election Day", "Polls open at 6:00 a.m. statewide");
        assert_eq!(
            ctx,
            "[Section 5: Election Day] Times mentioned: 6:00 a.m. | Polls open at 6:00 a.m. statewide"
        );
    }

    #[test]
    fn contextual_content_without_facts_is_just_the_title_prefix() {
        let ctx = contextual_content("Introduction", "Welcome to the manual");
        assert_eq!(ctx, "[Introduction] Welcome to the manual");
    }

    #[test]
    fn fact_lines_stack_in_a_fixed_order() {
        let facts = extract_facts(
            "On November 5 polls open at 6:00 a.m. The RED Transport Box contains: tabulator results",
        );
        assert_eq!(facts.len(), 3);
        assert!(facts[0].starts_with("Times mentioned:"));
        assert!(facts[1].starts_with("Dates mentioned:"));
        assert!(facts[2].starts_with("RED Transport Box contains:"));
    }
}
