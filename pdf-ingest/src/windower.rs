//! Sliding word windows within a single page.

use std::collections::HashMap;

use passage_model::{ChunkId, DocumentId, PageRecord, PassageRecord};

#[derive(Debug, Clone, Copy)]
pub struct WindowParams {
    /// Words per window.
    pub width: usize,
    /// Word overlap between adjacent windows.
    pub overlap: usize,
    /// Pages with fewer words than this emit no windows.
    pub min_page_words: usize,
    /// The trailing window is dropped when it falls below this many words.
    pub min_window_words: usize,
}

impl Default for WindowParams {
    fn default() -> Self {
        Self {
            width: 280,
            overlap: 60,
            min_page_words: 40,
            min_window_words: 15,
        }
    }
}

impl WindowParams {
    /// Window start stride; always at least one word.
    pub fn stride(&self) -> usize {
        self.width.saturating_sub(self.overlap).max(1)
    }
}

/// Slice each page into overlapping word windows. Windows never cross page
/// boundaries; `contextual_content` is left empty for the fact extractor.
pub fn window_pages(pages: &[PageRecord], params: &WindowParams) -> Vec<PassageRecord> {
    let mut out = Vec::new();
    let mut ordinals: HashMap<DocumentId, usize> = HashMap::new();

    for page in pages {
        let words: Vec<&str> = page.text.split_whitespace().collect();
        if words.len() < params.min_page_words {
            continue;
        }
        let stride = params.stride();
        let mut start = 0usize;
        while start < words.len() {
            let end = (start + params.width).min(words.len());
            if end - start < params.min_window_words {
                break;
            }
            let ordinal = ordinals.entry(page.doc_id.clone()).or_insert(0);
            let chunk_id = ChunkId::for_passage(&page.doc_id, *ordinal);
            *ordinal += 1;
            out.push(PassageRecord {
                chunk_id,
                doc_id: page.doc_id.clone(),
                doc_name: page.doc_name.clone(),
                page_num: page.page_num,
                section_title: page.title.clone(),
                raw_content: words[start..end].join(" "),
                contextual_content: String::new(),
            });
            start += stride;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(doc: &str, page_num: u32, words: usize) -> PageRecord {
        let text = (0..words)
            .map(|i| format!("word{i}"))
            .collect::<Vec<_>>()
            .join(" ");
        PageRecord {
            doc_id: DocumentId(doc.into()),
            doc_name: "Doc".into(),
            page_num,
            title: "Section 1: Test".into(),
            text,
        }
    }

    #[test]
    fn windows_advance_by_stride_and_respect_width() {
        let params = WindowParams::default();
        let passages = window_pages(&[page("d1", 1, 600)], &params);
        assert_eq!(passages.len(), 3);
        for p in &passages {
            let n = p.raw_content.split_whitespace().count();
            assert!((params.min_window_words..=params.width).contains(&n));
        }
        // 600 words: starts at 0, 220, 440.
        assert!(passages[0].raw_content.starts_with("word0 "));
        assert!(passages[1].raw_content.starts_with("word220 "));
        assert!(passages[2].raw_content.starts_with("word440 "));
        assert_eq!(passages[2].raw_content.split_whitespace().count(), 160);
    }

    #[test]
    fn short_trailing_window_is_dropped() {
        // 450 words: windows at 0 and 220; the slice at 440 has 10 words.
        let passages = window_pages(&[page("d1", 1, 450)], &WindowParams::default());
        assert_eq!(passages.len(), 2);
    }

    #[test]
    fn sparse_pages_emit_nothing() {
        let passages = window_pages(&[page("d1", 1, 39)], &WindowParams::default());
        assert!(passages.is_empty());
        let passages = window_pages(&[page("d1", 1, 40)], &WindowParams::default());
        assert_eq!(passages.len(), 1);
    }

    #[test]
    fn windows_never_cross_pages_and_ordinals_count_per_document() {
        let passages = window_pages(
            &[page("d1", 1, 300), page("d1", 2, 300), page("d2", 1, 50)],
            &WindowParams::default(),
        );
        // Each 300-word page yields windows at 0 and 220 (80 words).
        assert_eq!(passages.len(), 5);
        assert_eq!(passages[0].chunk_id.0, "d1#0");
        assert_eq!(passages[1].chunk_id.0, "d1#1");
        assert_eq!(passages[2].chunk_id.0, "d1#2");
        assert_eq!(passages[2].page_num, 2);
        assert_eq!(passages[4].chunk_id.0, "d2#0");
    }
}
