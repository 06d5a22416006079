//! Document-level ingestion: hashing, PDF page extraction, heading-aware
//! parsing, sliding-window chunking and fact extraction.

pub mod facts;
pub mod page_parser;
pub mod reader_pdf;
pub mod windower;

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use passage_model::DocumentId;
use sha2::Digest;

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse PDF `{path}`: {message}")]
    Pdf { path: PathBuf, message: String },
}

/// SHA-256 over the file streamed in 64 KiB blocks; the document id is the
/// lowercase hex of the first 8 digest bytes.
pub fn doc_hash(path: &Path) -> Result<DocumentId, IngestError> {
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let mut hasher = sha2::Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf).map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    let digest = hasher.finalize();
    Ok(DocumentId(hex::encode(&digest[..8])))
}

/// Human label for a document: file stem with `_`/`-` as spaces, title-cased.
pub fn doc_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.replace(['_', '-'], " ")
        .split_whitespace()
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

/// Recursively collect `*.pdf` files under `dir`, in ascending path order.
pub fn scan_pdfs(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let mut found = Vec::new();
    collect_pdfs(dir, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_pdfs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), IngestError> {
    let entries = std::fs::read_dir(dir).map_err(|source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| IngestError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_pdfs(&path, out)?;
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn doc_hash_is_stable_and_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        std::fs::write(&a, b"identical bytes").unwrap();
        std::fs::write(&b, b"identical bytes").unwrap();

        let ha = doc_hash(&a).unwrap();
        assert_eq!(ha, doc_hash(&a).unwrap());
        assert_eq!(ha, doc_hash(&b).unwrap());
        assert_eq!(ha.0.len(), 16);
        assert!(ha.0.chars().all(|c| c.is_ascii_hexdigit()));

        let mut f = std::fs::OpenOptions::new().append(true).open(&b).unwrap();
        f.write_all(b"!").unwrap();
        drop(f);
        assert_ne!(ha, doc_hash(&b).unwrap());
    }

    #[test]
    fn doc_names_are_title_cased_labels() {
        assert_eq!(
            doc_name_from_path(Path::new("docs/2026_march-manual.pdf")),
            "2026 March Manual"
        );
        assert_eq!(doc_name_from_path(Path::new("guide.pdf")), "Guide");
    }

    #[test]
    fn scan_finds_pdfs_recursively_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("z.pdf"), b"z").unwrap();
        std::fs::write(dir.path().join("sub/a.pdf"), b"a").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"n").unwrap();

        let found = scan_pdfs(dir.path()).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("sub/a.pdf"));
        assert!(found[1].ends_with("z.pdf"));
    }
}
