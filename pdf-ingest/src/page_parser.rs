//! Boilerplate stripping and section/subsection heading detection.
//!
//! The heuristics run as a fixed pipeline of pattern matches applied in a
//! defined order, terminating on the first hit. Thresholds are part of the
//! contract, not tunable at runtime.

use std::collections::HashSet;
use std::sync::OnceLock;

use passage_model::{DocumentId, PageRecord};
use regex::Regex;

/// Short repeated labels that appear on almost every page.
const BOILERPLATE_LABELS: &[&str] = &[
    "general info",
    "poll worker info",
    "equipment",
    "set up location",
    "open location",
    "checking in voters",
    "update registration",
    "voting",
    "election night",
    "nightly closing",
    "provisional voting",
    "equipment info",
    "table of contents",
];

/// Words that stay lowercase in title case.
const TITLE_SMALL_WORDS: &[&str] = &[
    "the", "and", "or", "for", "of", "a", "an", "in", "to", "on", "at", "by", "with", "is", "are",
    "as", "but", "not",
];

/// Column labels that signal heading text has run into a table.
const TABLE_MARKERS: &[&str] = &["what", "how", "action", "column", "description", "issue"];

const WORD_NUMS: &[(&str, &str)] = &[
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
    ("ten", "10"),
    ("eleven", "11"),
    ("twelve", "12"),
];

const BODY_TEXT_FRAGMENTS: &[&str] = &[
    "you will", "you can", "they will", "this is", "if the", "do not", "must be", "please",
    "may not", "should be",
];

fn running_header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\d{4}\s+\w+\s+Jurisdictional Manual[ \t]+[^\n]{0,100}\n\s*\d+\s*\n")
            .expect("valid pattern")
    })
}

fn page_num_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*\d+[ \t]*$").expect("valid pattern"))
}

fn label_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\n[ \t]*(?:Poll Worker Info|General Info|Set Up Location|Open Location|Election Night|Nightly Closing|Provisional Voting|Equipment Info)\s*\n",
        )
        .expect("valid pattern")
    })
}

fn section_word_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\n[ \t]*Section (?:One|Two|Three|Four|Five|Six|Seven|Eight|Nine|Ten)\s*\n")
            .expect("valid pattern")
    })
}

fn numbered_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d+\.\d+(?:\.\d+)?)\s+([A-Z].+)").expect("valid pattern"))
}

fn section_digit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(Section\s+\d+\s*[:\-–]?)\s+([A-Z].+)").expect("valid pattern"))
}

fn section_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(Section\s+(?:one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\s*[:\-–]?)\s+([A-Z].+)",
        )
        .expect("valid pattern")
    })
}

fn caps_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)([A-Z][A-Z\s]{8,50})(?:\s|$)").expect("valid pattern"))
}

fn word_num_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:one|two|three|four|five|six|seven|eight|nine|ten|eleven|twelve)\b")
            .expect("valid pattern")
    })
}

fn toc_page_ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.\s*\d+$").expect("valid pattern"))
}

fn bare_section_label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^Section\s+(?:One|Two|Three|Four|Five|Six|Seven|Eight|Nine|Ten|\d+)$")
            .expect("valid pattern")
    })
}

/// Remove running headers, bare page-number lines and repeated labels so
/// chunk words are not wasted on text that repeats on every page.
pub fn strip_page_boilerplate(text: &str) -> String {
    let text = running_header_re().replace_all(text, "");
    let text = page_num_line_re().replace_all(&text, "");
    let text = label_line_re().replace_all(&text, "\n");
    section_word_line_re().replace_all(&text, "\n").into_owned()
}

fn word_suffix_stem(word: &str) -> String {
    if word.ends_with("ing") && word.len() > 5 {
        return word[..word.len() - 3].to_string();
    }
    if word.ends_with("es") && word.len() > 4 {
        return word[..word.len() - 2].to_string();
    }
    if word.ends_with('s') && word.len() > 3 {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Cap a detected heading at 8 words, cutting at digits, table column labels
/// and repeated word stems (headings tend to bleed into the first table row).
fn extract_title(prefix: &str, rest: &str) -> String {
    let mut title_words: Vec<&str> = Vec::new();
    let mut seen_stems: HashSet<String> = HashSet::new();
    for word in rest.split_whitespace() {
        if title_words.len() >= 8 {
            break;
        }
        let lower = word.to_lowercase();
        let stem = word_suffix_stem(&lower);
        if word.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            break;
        }
        if TABLE_MARKERS.contains(&lower.as_str()) && title_words.len() >= 3 {
            break;
        }
        if seen_stems.contains(&stem) && title_words.len() >= 2 {
            break;
        }
        seen_stems.insert(stem);
        title_words.push(word);
    }
    format!("{} {}", prefix, title_words.join(" "))
        .trim()
        .to_string()
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn canonicalize_section_words(prefix: &str) -> String {
    word_num_re()
        .replace_all(prefix, |caps: &regex::Captures<'_>| {
            let lower = caps[0].to_lowercase();
            WORD_NUMS
                .iter()
                .find(|(word, _)| *word == lower)
                .map(|(_, digit)| digit.to_string())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Detect a top-level section heading from flattened page text.
///
/// Matchers run in order and stop at the first hit: numbered subsection,
/// `Section <digit>`, `Section <word>` (canonicalised to digits), then an
/// all-caps span of 8-50 chars and at most 8 words.
pub fn detect_section_heading(flat_text: &str) -> Option<String> {
    if let Some(caps) = numbered_heading_re().captures(flat_text) {
        return Some(extract_title(&caps[1], &caps[2]));
    }
    if let Some(caps) = section_digit_re().captures(flat_text) {
        return Some(extract_title(&caps[1], &caps[2]));
    }
    if let Some(caps) = section_word_re().captures(flat_text) {
        let prefix = canonicalize_section_words(&caps[1]);
        return Some(extract_title(&prefix, &caps[2]));
    }
    if let Some(caps) = caps_heading_re().captures(flat_text) {
        let heading = caps[1].trim().to_string();
        if heading.split_whitespace().count() <= 8 && heading == heading.to_uppercase() {
            return Some(title_case(&heading));
        }
    }
    None
}

/// Detect a subsection heading from one raw PDF line.
///
/// Accepts short title-case phrases such as "Voter Contacts" or
/// "Envelope Drop Box"; a trailing ", continued" is stripped for the checks
/// and restored on the stored title.
pub fn detect_subheading(line: &str) -> Option<String> {
    let mut stripped = line.trim().to_string();
    if stripped.is_empty() {
        return None;
    }
    if BOILERPLATE_LABELS.contains(&stripped.to_lowercase().as_str()) {
        return None;
    }

    let mut word_count = stripped.split_whitespace().count();
    if !(2..=8).contains(&word_count) {
        return None;
    }
    if stripped.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    if stripped
        .chars()
        .last()
        .is_some_and(|c| ".!?:;".contains(c))
    {
        return None;
    }
    if stripped.contains("..........") || toc_page_ref_re().is_match(&stripped) {
        return None;
    }
    if bare_section_label_re().is_match(&stripped) {
        return None;
    }

    let continued = stripped.to_lowercase().ends_with(", continued");
    if continued {
        stripped.truncate(stripped.len() - ", continued".len());
        stripped = stripped.trim().to_string();
        word_count = stripped.split_whitespace().count();
        if word_count < 2 {
            return None;
        }
    }

    if !stripped.chars().next().is_some_and(char::is_uppercase) {
        return None;
    }

    let mut cap_count = 0usize;
    let mut check_count = 0usize;
    for word in stripped.split_whitespace() {
        if TITLE_SMALL_WORDS.contains(&word.to_lowercase().as_str()) {
            continue;
        }
        check_count += 1;
        if word.chars().next().is_some_and(char::is_uppercase) {
            cap_count += 1;
        }
    }
    if check_count > 0 && (cap_count as f32) / (check_count as f32) < 0.6 {
        return None;
    }

    let lower = stripped.to_lowercase();
    if BODY_TEXT_FRAGMENTS.iter().any(|frag| lower.contains(frag)) {
        return None;
    }
    if stripped.starts_with('•')
        || stripped.starts_with('-')
        || stripped.starts_with('–')
        || stripped.starts_with("o ")
        || stripped.starts_with('►')
    {
        return None;
    }

    if continued {
        Some(format!("{stripped}, continued"))
    } else {
        Some(stripped)
    }
}

/// Turn raw page texts into ordered [`PageRecord`]s with inferred titles.
///
/// The active section carries forward across pages and resets the active
/// subsection; the first page defaults to "Introduction". Pages whose
/// stripped text is shorter than 30 characters are skipped.
pub fn parse_pages(page_texts: &[String], doc_id: &DocumentId, doc_name: &str) -> Vec<PageRecord> {
    let mut pages = Vec::new();
    let mut last_section = String::from("Introduction");
    let mut last_subsection = String::new();

    for (index, raw_text) in page_texts.iter().enumerate() {
        let flat = raw_text.split_whitespace().collect::<Vec<_>>().join(" ");
        if let Some(section) = detect_section_heading(&flat) {
            last_section = section;
            last_subsection.clear();
        }

        // Subheadings sit near the top of the page.
        for line in raw_text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .take(8)
        {
            if let Some(sub) = detect_subheading(line) {
                last_subsection = sub;
                break;
            }
        }

        let title = if last_subsection.is_empty() {
            last_section.clone()
        } else {
            format!("{last_section} > {last_subsection}")
        };

        let text = strip_page_boilerplate(raw_text)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if text.trim().len() < 30 {
            continue;
        }

        pages.push(PageRecord {
            doc_id: doc_id.clone(),
            doc_name: doc_name.to_string(),
            page_num: index as u32 + 1,
            title,
            text,
        });
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbered_subsection_headings_win() {
        let detected = detect_section_heading("intro text 4.2 Ballot Handling Procedures begin");
        assert_eq!(detected.as_deref(), Some("4.2 Ballot Handling Procedures begin"));
    }

    #[test]
    fn section_digit_headings_are_detected() {
        let detected = detect_section_heading("Section 5: Election Day procedures start at dawn");
        assert_eq!(
            detected.as_deref(),
            Some("Section 5: Election Day procedures start at dawn")
        );
    }

    #[test]
    fn written_section_numbers_are_canonicalised() {
        let detected = detect_section_heading("Section Five: Opening The Location");
        let title = detected.expect("heading detected");
        assert!(title.starts_with("Section 5"), "got `{title}`");
    }

    #[test]
    fn all_caps_spans_become_title_case_headings() {
        let detected = detect_section_heading("some preamble OPENING THE VOTING LOCATION more text");
        assert_eq!(detected.as_deref(), Some("Opening The Voting Location"));
    }

    #[test]
    fn heading_extraction_stops_at_digits_and_repeats() {
        assert_eq!(
            extract_title("Section 3:", "Voting 15 minute rules"),
            "Section 3: Voting"
        );
        assert_eq!(
            extract_title("1.1", "Ballots Ballots Ballots Everywhere"),
            "1.1 Ballots Ballots"
        );
    }

    #[test]
    fn subheadings_accept_title_case_phrases_only() {
        assert_eq!(
            detect_subheading("Voter Contacts").as_deref(),
            Some("Voter Contacts")
        );
        assert_eq!(
            detect_subheading("Envelope Drop Box, continued").as_deref(),
            Some("Envelope Drop Box, continued")
        );
        assert!(detect_subheading("you will need a pen").is_none());
        assert!(detect_subheading("Voter Contacts.").is_none());
        assert!(detect_subheading("3 Easy Steps").is_none());
        assert!(detect_subheading("Voter Contacts .......... 12").is_none());
        assert!(detect_subheading("Section Five").is_none());
        assert!(detect_subheading("Poll Worker Info").is_none());
    }

    #[test]
    fn boilerplate_lines_are_removed() {
        let raw = "Intro line\n2026 March Jurisdictional Manual   Section Two: Poll Worker Information\n11\nPoll Worker Info\nReal content stays here.\n";
        let stripped = strip_page_boilerplate(raw);
        assert!(stripped.contains("Real content stays here."));
        assert!(!stripped.contains("Jurisdictional Manual"));
        assert!(!stripped.contains("Poll Worker Info"));
    }

    #[test]
    fn sections_carry_forward_and_short_pages_are_dropped() {
        let doc_id = DocumentId("feedc0de12345678".into());
        let texts = vec![
            "Section 5: Election Day\nPolls are open from dawn to dusk and every worker should arrive early for setup.".to_string(),
            "tiny".to_string(),
            "Continuation page with plenty of additional words describing the procedures in detail for everyone.".to_string(),
        ];
        let pages = parse_pages(&texts, &doc_id, "Manual");
        assert_eq!(pages.len(), 2);
        assert!(pages[0].title.starts_with("Section 5"));
        assert_eq!(pages[1].page_num, 3);
        assert!(pages[1].title.starts_with("Section 5"));
    }

    #[test]
    fn first_page_defaults_to_introduction() {
        let doc_id = DocumentId("feedc0de12345678".into());
        let texts =
            vec!["An opening page without any heading but with enough words to keep.".to_string()];
        let pages = parse_pages(&texts, &doc_id, "Manual");
        assert_eq!(pages[0].title, "Introduction");
    }

    #[test]
    fn new_section_resets_active_subsection() {
        let doc_id = DocumentId("feedc0de12345678".into());
        let texts = vec![
            "Section 2: Poll Workers guidance begins\nVoter Contacts\nLots of words about contacting voters across the county follow here.".to_string(),
            "Section 3: Equipment care rules are described now\nWords about the machines and their daily care routines continue for a while.".to_string(),
        ];
        let pages = parse_pages(&texts, &doc_id, "Manual");
        assert!(pages[0].title.contains("> Voter Contacts"));
        assert!(!pages[1].title.contains('>'));
    }
}
