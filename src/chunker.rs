use std::sync::LazyLock;

use encoding_rs::WINDOWS_1251;
use regex::Regex;

use crate::models::Chunk;

static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([.!?…]+["'»”)\]]*)\s+"#).expect("sentence boundary pattern is valid")
});

const KEPT_PUNCTUATION: &[char] = &[
    '.', ',', '!', '?', '…', '—', '–', '-', ':', ';', '\'', '"', '«', '»', '(', ')', '_',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Utf8,
    Windows1251,
}

impl SourceEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceEncoding::Utf8 => "utf-8",
            SourceEncoding::Windows1251 => "windows-1251",
        }
    }
}

/// UTF-8 when the bytes are valid UTF-8, otherwise Windows-1251, the usual
/// encoding of Russian plain-text books.
pub fn decode_source(bytes: &[u8]) -> (String, SourceEncoding) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (
            text.strip_prefix('\u{FEFF}').unwrap_or(text).to_string(),
            SourceEncoding::Utf8,
        ),
        Err(_) => {
            let (text, _) = WINDOWS_1251.decode_without_bom_handling(bytes);
            (text.into_owned(), SourceEncoding::Windows1251)
        }
    }
}

pub fn normalize_source(text: &str) -> String {
    text.replace('\u{00A0}', " ")
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || KEPT_PUNCTUATION.contains(c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, Copy)]
struct Sentence {
    start: usize,
    end: usize,
    weight: usize,
}

fn split_sentences(text: &str) -> Vec<Sentence> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for caps in SENTENCE_END.captures_iter(text) {
        let (Some(whole), Some(terminator)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        push_sentence(text, start, terminator.end(), &mut sentences);
        start = whole.end();
    }
    push_sentence(text, start, text.len(), &mut sentences);

    sentences
}

fn push_sentence(text: &str, start: usize, end: usize, out: &mut Vec<Sentence>) {
    let slice = &text[start..end];
    let begin = start + (slice.len() - slice.trim_start().len());
    let finish = start + slice.trim_end().len();
    if finish <= begin {
        return;
    }
    out.push(Sentence {
        start: begin,
        end: finish,
        // +1 for the separator that joins it to the next sentence
        weight: text[begin..finish].chars().count() + 1,
    });
}

// A sentence that alone reaches `chunk_size` becomes its own chunk and is
// never carried as overlap.
pub fn chunk_text(text: &str, chunk_size: usize, overlap_sentences: usize) -> Vec<Chunk> {
    let sentences = split_sentences(text);
    let mut chunks = Vec::new();
    let mut current: Vec<usize> = Vec::new();
    let mut current_len = 0;
    let mut has_new = false;

    for (i, sentence) in sentences.iter().enumerate() {
        if sentence.weight >= chunk_size {
            if has_new {
                chunks.push(build_chunk(text, &sentences, &current, chunks.len()));
            }
            chunks.push(build_chunk(text, &sentences, &[i], chunks.len()));
            current.clear();
            current_len = 0;
            has_new = false;
            continue;
        }

        current.push(i);
        current_len += sentence.weight;
        has_new = true;

        if current_len >= chunk_size {
            chunks.push(build_chunk(text, &sentences, &current, chunks.len()));
            current = overlap_tail(&sentences, &current, overlap_sentences, chunk_size);
            current_len = current.iter().map(|&j| sentences[j].weight).sum();
            has_new = false;
        }
    }

    if has_new {
        chunks.push(build_chunk(text, &sentences, &current, chunks.len()));
    }

    tracing::debug!(
        sentences = sentences.len(),
        chunks = chunks.len(),
        chunk_size,
        overlap_sentences,
        "chunked text"
    );

    chunks
}

fn overlap_tail(
    sentences: &[Sentence],
    current: &[usize],
    overlap_sentences: usize,
    chunk_size: usize,
) -> Vec<usize> {
    let keep = overlap_sentences.min(current.len());
    let mut tail = current[current.len() - keep..].to_vec();
    while !tail.is_empty() && tail.iter().map(|&j| sentences[j].weight).sum::<usize>() >= chunk_size
    {
        tail.remove(0);
    }
    tail
}

fn build_chunk(text: &str, sentences: &[Sentence], members: &[usize], index: usize) -> Chunk {
    let start_offset = sentences[members[0]].start;
    let end_offset = sentences[members[members.len() - 1]].end;
    Chunk {
        index,
        text: text[start_offset..end_offset].to_string(),
        start_offset,
        end_offset,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_windows_1251_books() {
        let (bytes, _, unmappable) = WINDOWS_1251.encode("Мастер пишет роман.");
        assert!(!unmappable);
        assert!(std::str::from_utf8(&bytes).is_err());

        let (text, encoding) = decode_source(&bytes);
        assert_eq!(encoding, SourceEncoding::Windows1251);
        assert_eq!(text, "Мастер пишет роман.");
        assert_eq!(normalize_source(&text), "Мастер пишет роман.");
    }

    #[test]
    fn utf8_input_is_kept_as_is() {
        let (text, encoding) = decode_source("\u{FEFF}Воланд в Москве.".as_bytes());
        assert_eq!(encoding, SourceEncoding::Utf8);
        assert_eq!(text, "Воланд в Москве.");
    }

    fn uniform_text(count: usize) -> String {
        (0..count)
            .map(|i| format!("Sentence {i:03} {}.", "a".repeat(85)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn rebuild(text: &str, chunks: &[Chunk]) -> String {
        let mut rebuilt = String::new();
        let mut covered = 0;
        for chunk in chunks {
            if chunk.start_offset >= covered {
                rebuilt.push(' ');
                rebuilt.push_str(&chunk.text);
            } else {
                rebuilt.push_str(&text[covered..chunk.end_offset]);
            }
            covered = chunk.end_offset;
        }
        rebuilt.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn ten_thousand_chars_make_four_overlapping_chunks() {
        let text = uniform_text(100);
        assert_eq!(text.chars().count(), 9_999);

        let chunks = chunk_text(&text, 3_000, 3);
        assert_eq!(chunks.len(), 4);

        for pair in chunks.windows(2) {
            let shared = &text[pair[1].start_offset..pair[0].end_offset];
            assert_eq!(split_sentences(shared).len(), 3);
        }

        let last = chunks.last().unwrap();
        assert!(last.text.chars().count() < 3_000 + 100);
    }

    #[test]
    fn indices_are_contiguous_and_text_is_reconstructed() {
        let text = uniform_text(57);
        for (size, overlap) in [(500, 0), (500, 2), (1_200, 5), (250, 1)] {
            let chunks = chunk_text(&text, size, overlap);
            assert!(!chunks.is_empty());
            for (i, chunk) in chunks.iter().enumerate() {
                assert_eq!(chunk.index, i);
                assert!(chunk.end_offset > chunk.start_offset);
                assert_eq!(chunk.text, &text[chunk.start_offset..chunk.end_offset]);
            }
            assert_eq!(rebuild(&text, &chunks), text, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn zero_overlap_produces_disjoint_chunks() {
        let text = uniform_text(20);
        let chunks = chunk_text(&text, 500, 0);
        for pair in chunks.windows(2) {
            assert!(pair[1].start_offset > pair[0].end_offset);
        }
    }

    #[test]
    fn short_input_is_a_single_chunk() {
        let text = "Мастер пишет роман. Маргарита ждёт!";
        let chunks = chunk_text(text, 3_000, 3);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, text.len());
    }

    #[test]
    fn oversize_sentence_stands_alone_and_is_not_cut() {
        let huge = format!("{} end.", "word ".repeat(1_000));
        let text = format!("Short one. {huge} Another short.");
        let chunks = chunk_text(&text, 100, 2);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Short one.");
        assert_eq!(chunks[1].text, huge);
        assert_eq!(chunks[2].text, "Another short.");
    }

    #[test]
    fn empty_input_has_no_chunks() {
        assert!(chunk_text("", 100, 2).is_empty());
        assert!(chunk_text("   \n ", 100, 2).is_empty());
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = uniform_text(33);
        assert_eq!(chunk_text(&text, 700, 2), chunk_text(&text, 700, 2));
    }

    #[test]
    fn sentence_split_keeps_closing_quotes() {
        let text = "Он сказал: «Уходи!» Она ушла… Конец?";
        let parts: Vec<&str> = split_sentences(text)
            .iter()
            .map(|s| &text[s.start..s.end])
            .collect();
        assert_eq!(parts, vec!["Он сказал: «Уходи!»", "Она ушла…", "Конец?"]);
    }

    #[test]
    fn normalize_source_flattens_and_strips_symbols() {
        let raw = "Глава 1\n\n  Он\u{00A0}пришёл * домой # сразу.\tИ всё.";
        assert_eq!(normalize_source(raw), "Глава 1 Он пришёл домой сразу. И всё.");
    }
}
