//! Lexical index backed by the `bm25` crate, keyed by record ordinal.
//!
//! Keying by ordinal rather than document text means two records with the
//! same contextual string can never collapse into one id.

use bm25::{Document, Language, SearchEngine, SearchEngineBuilder};

#[derive(Debug)]
pub struct Bm25Index {
    engine: Option<SearchEngine<u32>>,
    len: usize,
}

impl Bm25Index {
    /// Index a fixed corpus; English tokenisation with stop-word removal.
    pub fn build<'a, I>(corpus: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let documents: Vec<Document<u32>> = corpus
            .into_iter()
            .enumerate()
            .map(|(ordinal, contents)| Document::new(ordinal as u32, contents))
            .collect();
        let len = documents.len();
        let engine = if documents.is_empty() {
            None
        } else {
            Some(SearchEngineBuilder::with_documents(Language::English, documents).build())
        };
        Self { engine, len }
    }

    /// Ranked `(ordinal, score)` pairs for up to `limit` matching records.
    pub fn scores(&self, query: &str, limit: usize) -> Vec<(usize, f32)> {
        let Some(engine) = &self.engine else {
            return Vec::new();
        };
        if limit == 0 {
            return Vec::new();
        }
        engine
            .search(query, limit)
            .into_iter()
            .map(|hit| (hit.document.id as usize, hit.score))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_terms_rank_the_right_record_first() {
        let index = Bm25Index::build([
            "the ballot scanner rejects wet ballots",
            "curbside voting needs two poll workers",
            "the wait time hotline updates hourly",
        ]);
        let hits = index.scores("curbside voting", 3);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].0, 1);
    }

    #[test]
    fn records_without_query_terms_are_absent() {
        let index = Bm25Index::build(["alpha beta", "gamma delta"]);
        let hits = index.scores("alpha", 2);
        assert!(hits.iter().all(|(ordinal, _)| *ordinal == 0));
    }

    #[test]
    fn empty_corpus_yields_no_hits() {
        let index = Bm25Index::build(Vec::<&str>::new());
        assert!(index.is_empty());
        assert!(index.scores("anything", 10).is_empty());
    }
}
