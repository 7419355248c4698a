use docrag_core::chunker::{chunk_text, normalize_whitespace};

const SAMPLES: &[&str] = &[
    "The quick brown fox jumps over the lazy dog.",
    "Lorem ipsum dolor sit amet,\n\nconsectetur   adipiscing elit, sed do eiusmod tempor incididunt ut labore.",
    "línea uno\tlínea dos — ñandú, über, 東京タワー and more text to wrap around",
    "x",
];

fn rebuild(chunks: &[String], step: usize) -> String {
    let mut out: String = String::new();
    for (i, c) in chunks.iter().enumerate() {
        if i == 0 { out.push_str(c); continue; }
        let skip = out.chars().count() - i * step;
        out.extend(c.chars().skip(skip));
    }
    out
}

#[test]
fn windows_cover_text_without_gaps() {
    for text in SAMPLES {
        let normalized = normalize_whitespace(text);
        for (size, overlap) in [(5, 0), (7, 2), (10, 9), (16, 4), (100, 10)] {
            let chunks = chunk_text(text, size, overlap);
            assert!(!chunks.is_empty());
            assert_eq!(rebuild(&chunks, size - overlap), normalized, "size={size} overlap={overlap}");
        }
    }
}

#[test]
fn consecutive_windows_overlap_exactly() {
    for text in SAMPLES {
        for (size, overlap) in [(6, 1), (8, 3), (12, 11)] {
            let chunks = chunk_text(text, size, overlap);
            for pair in chunks.windows(2) {
                let prev: Vec<char> = pair[0].chars().collect();
                let next: Vec<char> = pair[1].chars().collect();
                assert_eq!(prev.len(), size, "only the last window may be short");
                assert_eq!(&prev[size - overlap..], &next[..overlap]);
            }
        }
    }
}

#[test]
fn empty_and_whitespace_text_yield_nothing() {
    assert!(chunk_text("", 900, 150).is_empty());
    assert!(chunk_text(" \n\t  ", 900, 150).is_empty());
}

#[test]
fn overlap_not_smaller_than_size_terminates() {
    let text = "abcdefghijklmnopqrstuvwxyz";
    for (size, overlap) in [(4, 4), (4, 10), (1, 1), (3, usize::MAX)] {
        let chunks = chunk_text(text, size, overlap);
        // start advances by exactly one character per window
        assert_eq!(chunks.len(), text.len() - size + 1, "size={size} overlap={overlap}");
        assert_eq!(chunks.last().map(String::as_str), Some(&text[text.len() - size..]));
    }
}

#[test]
fn chunking_is_deterministic() {
    let text = SAMPLES[1];
    assert_eq!(chunk_text(text, 9, 3), chunk_text(text, 9, 3));
}

#[test]
fn repeated_sentence_fits_one_default_chunk() {
    let text = "The sky is blue. ".repeat(50);
    let chunks = chunk_text(&text, 900, 150);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0], text.trim());
    assert_eq!(chunks[0].chars().count(), 849);
}
