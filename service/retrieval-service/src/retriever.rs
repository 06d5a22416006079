//! The query pipeline: lexical + dense scoring, min-max normalisation,
//! weighted fusion with score adjustments, keyword rescue, page-level rescue
//! and dedup.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::OnceLock;

use embedding_provider::embedder::Embedder;
use passage_index::dense::min_max_normalize;
use passage_index::{ChunkIndex, Snapshot};
use passage_model::PassageRecord;
use regex::Regex;
use tracing::{debug, info};

use crate::api::RetrievedPassage;
use crate::llm::expand_query;
use crate::{ServiceError, SidecarConfig};

/// How many best-matching pages the page-level pass considers.
const PAGE_RESCUE_PAGES: usize = 3;

fn time_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b\d{1,2}:\d{2}\s*(?:a\.m\.|p\.m\.|am|pm)").expect("valid pattern")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(\d{3}\)\s*\d{3}[-\s]\d{4}").expect("valid pattern"))
}

fn integer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d+\b").expect("valid pattern"))
}

fn phone_query_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bphone\b|\bhotline\b|\bnumber\b|\bcontact\b").expect("valid pattern")
    })
}

fn low_priority_section_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)appendix|faq|glossary|toc|index|job duty card|marshal|election night only|nightly closing",
        )
        .expect("valid pattern")
    })
}

fn low_priority_content_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)Appendix\s+\d+|FAQ,? continued|Job Duty Card|Marshal Job Duty")
            .expect("valid pattern")
    })
}

fn rescue_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-z0-9]+(?:[.'-][a-z0-9]+)*").expect("valid pattern"))
}

fn rescue_phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(\d{3}\)\s*\d{3}[- ]?\d{4}").expect("valid pattern"))
}

/// All-caps identifiers (optionally trailing Title words): colour codes like
/// `BLUE`, emphasised tokens like `FORMER Address`.
fn caps_term_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b[A-Z]{2,}(?:\s+[A-Z][a-z]+)*\b").expect("valid pattern"))
}

/// Query words too common to count as distinctive during keyword rescue.
const RESCUE_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "was", "how", "what", "when", "where", "who", "does", "can",
    "they", "their", "this", "that", "with", "from", "have", "been", "will", "would", "should",
    "could", "about", "into", "than", "also", "just", "very", "much", "some", "any", "all",
    "each", "which", "there", "these", "those", "other", "your", "after", "before", "between",
    "during", "through", "above", "below", "out", "off", "over", "under", "again", "further",
    "then", "once", "here", "why", "both", "few", "more", "most", "such", "only", "same", "too",
    "but", "not", "own", "its", "our", "you", "has", "had", "did", "get", "got", "let", "may",
    "use", "way", "try", "ask", "put", "say", "take", "come", "make", "like", "know", "see",
    "think", "want", "give", "tell", "call", "keep", "show", "turn", "move", "need", "still",
    "might", "must", "shall", "upon", "onto", "within", "without", "along", "since", "until",
    "while", "whom", "whose",
];

/// Query features that drive additive score adjustments.
struct QuerySignals {
    times: Vec<String>,
    integer_patterns: Vec<Regex>,
    query_has_time: bool,
    asks_phone: bool,
}

impl QuerySignals {
    fn from_query(query: &str) -> Self {
        let mut times: Vec<String> = Vec::new();
        for found in time_re().find_iter(query) {
            let text = found.as_str().to_string();
            if !times.contains(&text) {
                times.push(text);
            }
        }
        let mut integers: Vec<String> = Vec::new();
        for found in integer_re().find_iter(query) {
            let text = found.as_str().to_string();
            if !integers.contains(&text) {
                integers.push(text);
            }
        }
        let integer_patterns = integers
            .iter()
            .map(|n| Regex::new(&format!(r"\b{}\b", regex::escape(n))).expect("valid pattern"))
            .collect();
        Self {
            query_has_time: !times.is_empty(),
            times,
            integer_patterns,
            asks_phone: phone_query_re().is_match(query),
        }
    }

    /// Additive fused-score adjustment for one passage; may be negative.
    fn adjustment(&self, passage: &PassageRecord) -> f32 {
        let raw = &passage.raw_content;
        let raw_lower = raw.to_lowercase();
        let mut adjustment = 0.0f32;

        for time in &self.times {
            if raw_lower.contains(&time.to_lowercase()) {
                adjustment += 0.15;
            }
        }
        for pattern in &self.integer_patterns {
            if pattern.is_match(raw) {
                adjustment += 0.05;
            }
        }
        // Broad boost: a time-bearing chunk for a time-bearing query.
        if self.query_has_time && time_re().is_match(raw) {
            adjustment += 0.05;
        }
        if self.asks_phone && phone_re().is_match(raw) {
            adjustment += 0.3;
        }
        if low_priority_section_re().is_match(&passage.section_title) {
            adjustment -= 0.5;
        }
        if low_priority_content_re().is_match(raw) {
            adjustment -= 0.4;
        }
        adjustment
    }
}

fn push_result(
    results: &mut Vec<RetrievedPassage>,
    chosen: &mut HashSet<usize>,
    index: &ChunkIndex,
    ordinal: usize,
    score: f32,
) {
    if let Some(passage) = index.get(ordinal) {
        results.push(RetrievedPassage {
            chunk_id: passage.chunk_id.0.clone(),
            page_number: passage.page_num,
            section_title: passage.section_title.clone(),
            chunk_content: passage.raw_content.clone(),
            score,
            document_id: passage.doc_id.0.clone(),
            document_name: passage.doc_name.clone(),
        });
        chosen.insert(ordinal);
    }
}

fn sort_scored_desc(scored: &mut [(usize, f32)]) {
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}

/// Full query pipeline over one immutable snapshot.
pub fn retrieve(
    snapshot: &Snapshot,
    embedder: &dyn Embedder,
    cfg: &SidecarConfig,
    query: &str,
    top_k: usize,
) -> Result<Vec<RetrievedPassage>, ServiceError> {
    let chunk_index = &snapshot.chunk_index;
    let search_query = expand_query(query);

    let lexical = chunk_index.lexical_scores(search_query);
    let query_vec = embedder
        .embed(query)
        .map_err(|err| ServiceError::Embed(err.to_string()))?;
    let dense = chunk_index.dense_scores(&query_vec);

    let lexical_norm = min_max_normalize(&lexical);
    let dense_norm = min_max_normalize(&dense);

    let signals = QuerySignals::from_query(query);
    let candidates: BTreeSet<usize> = lexical_norm
        .keys()
        .chain(dense_norm.keys())
        .copied()
        .collect();
    let mut fused: Vec<(usize, f32)> = candidates
        .into_iter()
        .filter_map(|ordinal| {
            chunk_index.get(ordinal).map(|passage| {
                let score = cfg.fusion_weight_lexical
                    * lexical_norm.get(&ordinal).copied().unwrap_or(0.0)
                    + cfg.fusion_weight_dense * dense_norm.get(&ordinal).copied().unwrap_or(0.0)
                    + signals.adjustment(passage);
                (ordinal, score)
            })
        })
        .collect();
    sort_scored_desc(&mut fused);
    let fused_lookup: HashMap<usize, f32> = fused.iter().copied().collect();

    let mut results: Vec<RetrievedPassage> = Vec::new();
    let mut chosen: HashSet<usize> = HashSet::new();

    // Primary fill leaves the reserved slots for keyword rescue.
    let primary_budget = top_k.saturating_sub(cfg.reserved_rescue_slots);
    for &(ordinal, score) in &fused {
        if results.len() >= primary_budget {
            break;
        }
        push_result(&mut results, &mut chosen, chunk_index, ordinal, score);
    }

    keyword_rescue(
        query,
        &fused,
        chunk_index,
        cfg,
        top_k,
        &mut results,
        &mut chosen,
    );

    let weak_top = results
        .first()
        .is_some_and(|first| first.score < cfg.low_score_threshold);
    if weak_top && !snapshot.page_index.is_empty() {
        page_rescue(
            snapshot,
            query,
            &query_vec,
            &fused_lookup,
            cfg,
            top_k,
            &mut results,
            &mut chosen,
        );
    }

    info!(query = %query.chars().take(80).collect::<String>(), results = results.len(), "retrieve");
    for (rank, result) in results.iter().enumerate() {
        debug!(
            rank = rank + 1,
            score = result.score,
            page = result.page_number,
            section = %result.section_title,
            doc = %result.document_name,
            preview = %result.chunk_content.chars().take(300).collect::<String>(),
            "result"
        );
    }
    Ok(results)
}

/// Promote candidates carrying distinctive query terms that the fused
/// ranking missed. Candidates are considered in descending fused order.
#[allow(clippy::too_many_arguments)]
fn keyword_rescue(
    query: &str,
    ranked: &[(usize, f32)],
    chunk_index: &ChunkIndex,
    cfg: &SidecarConfig,
    top_k: usize,
    results: &mut Vec<RetrievedPassage>,
    chosen: &mut HashSet<usize>,
) {
    if cfg.reserved_rescue_slots == 0 {
        return;
    }

    let query_lower = query.to_lowercase();
    let mut tokens: Vec<String> = Vec::new();
    for found in rescue_token_re().find_iter(&query_lower) {
        let word = found.as_str();
        if word.len() >= 3
            && !RESCUE_STOP_WORDS.contains(&word)
            && !tokens.iter().any(|t| t == word)
        {
            tokens.push(word.to_string());
        }
    }
    let threshold = 2usize.max(tokens.len() / 2);

    let mut high_value: Vec<String> = rescue_phone_re()
        .find_iter(query)
        .map(|m| m.as_str().to_string())
        .collect();
    high_value.extend(
        caps_term_re()
            .find_iter(query)
            .map(|m| m.as_str().to_string()),
    );

    let mut added = 0usize;
    for &(ordinal, score) in ranked {
        if added >= cfg.reserved_rescue_slots || results.len() >= top_k {
            break;
        }
        if chosen.contains(&ordinal) {
            continue;
        }
        let Some(passage) = chunk_index.get(ordinal) else {
            continue;
        };
        let combined = format!(
            "{} {}",
            passage.raw_content.to_lowercase(),
            passage.contextual_content.to_lowercase()
        );
        let pattern_hit = high_value
            .iter()
            .any(|term| combined.contains(&term.to_lowercase()));
        let token_hits = tokens
            .iter()
            .filter(|word| combined.contains(word.as_str()))
            .count();
        if pattern_hit || token_hits >= threshold {
            debug!(chunk = %passage.chunk_id, pattern_hit, token_hits, "keyword rescue");
            push_result(results, chosen, chunk_index, ordinal, score);
            added += 1;
        }
    }
}

/// When the top fused score is weak, consult the page-level index and inject
/// the best-fused chunk of each top page not already represented.
#[allow(clippy::too_many_arguments)]
fn page_rescue(
    snapshot: &Snapshot,
    query: &str,
    query_vec: &[f32],
    fused_lookup: &HashMap<usize, f32>,
    cfg: &SidecarConfig,
    top_k: usize,
    results: &mut Vec<RetrievedPassage>,
    chosen: &mut HashSet<usize>,
) {
    let page_index = &snapshot.page_index;
    let lexical = page_index.lexical_scores(query);
    let dense = page_index.dense_scores(query_vec);
    let lexical_norm = min_max_normalize(&lexical);
    let dense_norm = min_max_normalize(&dense);

    let candidates: BTreeSet<usize> = lexical_norm
        .keys()
        .chain(dense_norm.keys())
        .copied()
        .collect();
    let mut fused_pages: Vec<(usize, f32)> = candidates
        .into_iter()
        .map(|ordinal| {
            let score = cfg.fusion_weight_lexical
                * lexical_norm.get(&ordinal).copied().unwrap_or(0.0)
                + cfg.fusion_weight_dense * dense_norm.get(&ordinal).copied().unwrap_or(0.0);
            (ordinal, score)
        })
        .collect();
    sort_scored_desc(&mut fused_pages);
    fused_pages.truncate(PAGE_RESCUE_PAGES);

    let represented: HashSet<(String, u32)> = results
        .iter()
        .map(|result| (result.document_id.clone(), result.page_number))
        .collect();

    for (page_ordinal, _) in fused_pages {
        if results.len() >= top_k {
            break;
        }
        let Some(page) = page_index.get(page_ordinal) else {
            continue;
        };
        if represented.contains(&(page.doc_id.0.clone(), page.page_num)) {
            continue;
        }

        let mut best: Option<(usize, f32)> = None;
        for (ordinal, passage) in snapshot.chunk_index.passages().iter().enumerate() {
            if chosen.contains(&ordinal)
                || passage.doc_id != page.doc_id
                || passage.page_num != page.page_num
            {
                continue;
            }
            let score = fused_lookup.get(&ordinal).copied().unwrap_or(0.0);
            match best {
                Some((_, best_score)) if best_score >= score => {}
                _ => best = Some((ordinal, score)),
            }
        }
        if let Some((ordinal, score)) = best {
            info!(page = page.page_num, title = %page.title, "page rescue injected chunk");
            push_result(results, chosen, &snapshot.chunk_index, ordinal, score);
        }
    }
}
