use thiserror::Error;

/// Default wrap width for chunk segments, in characters.
pub const DEFAULT_CHUNK_WIDTH: usize = 500;
/// Segments at or below this trimmed length are discarded as boilerplate.
pub const DEFAULT_MIN_CHUNK_LEN: usize = 100;

#[derive(Debug, Error)]
pub enum ChunkingError {
    #[error("text content is too short to process (minimum {minimum} characters required)")]
    TooShort { minimum: usize },
    #[error("no valid text chunks could be extracted; the content may be too short or contain only whitespace")]
    NoValidChunks,
}

/// A bounded fragment of source text, the unit of retrieval and citation.
///
/// `index` is the chunk's position in the filtered sequence produced from one
/// document. It is stable for the lifetime of the index built over it, so a
/// search hit can be mapped back to its text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
}

/// Splits `text` into word-wrapped chunks of at most `width` characters,
/// dropping segments whose trimmed length is at or below `min_len`.
///
/// Scraped pages rarely carry reliable sentence punctuation, so wrapping is
/// width-based rather than sentence-based; the minimum-length filter removes
/// nav remnants and stray headers that survive upstream cleanup.
pub fn chunk(text: &str, width: usize, min_len: usize) -> Result<Vec<Chunk>, ChunkingError> {
    if text.chars().count() < min_len {
        return Err(ChunkingError::TooShort { minimum: min_len });
    }

    let chunks: Vec<Chunk> = wrap_words(text, width)
        .into_iter()
        .filter(|segment| segment.chars().count() > min_len)
        .enumerate()
        .map(|(index, text)| Chunk { text, index })
        .collect();

    if chunks.is_empty() {
        return Err(ChunkingError::NoValidChunks);
    }

    Ok(chunks)
}

/// Greedy word wrap: words are packed left to right into segments of at most
/// `width` characters and never split across segments, except that a single
/// word longer than `width` becomes a segment of its own.
fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len > width {
            segments.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        segments.push(current);
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prose(words: usize) -> String {
        // Deterministic lorem-ipsum-style filler, 6-char words.
        (0..words)
            .map(|i| format!("lorem{}", i % 10))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn too_short_input_is_rejected() {
        let err = chunk("short", DEFAULT_CHUNK_WIDTH, DEFAULT_MIN_CHUNK_LEN).unwrap_err();
        assert!(matches!(err, ChunkingError::TooShort { minimum: 100 }));
    }

    #[test]
    fn whitespace_only_input_yields_no_valid_chunks() {
        let text = " ".repeat(150);
        let err = chunk(&text, DEFAULT_CHUNK_WIDTH, DEFAULT_MIN_CHUNK_LEN).unwrap_err();
        assert!(matches!(err, ChunkingError::NoValidChunks));
    }

    #[test]
    fn words_are_not_split_across_segments() {
        let text = prose(200);
        let chunks = chunk(&text, 50, 10).unwrap();
        for c in &chunks {
            assert!(c.text.chars().count() <= 50);
            for word in c.text.split_whitespace() {
                assert!(word.starts_with("lorem"), "split word: {word}");
            }
        }
    }

    #[test]
    fn indices_are_contiguous_over_the_filtered_sequence() {
        // 50 six-char words wrap at width 150 into segments of 21, 21 and 8
        // words; the 8-word tail (55 chars) falls below the floor and is
        // dropped, and the survivors are reindexed 0, 1.
        let text = prose(50);
        let chunks = chunk(&text, 150, 100).unwrap();
        assert_eq!(chunks.len(), 2);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn chunking_is_deterministic() {
        let text = prose(300);
        let a = chunk(&text, DEFAULT_CHUNK_WIDTH, DEFAULT_MIN_CHUNK_LEN).unwrap();
        let b = chunk(&text, DEFAULT_CHUNK_WIDTH, DEFAULT_MIN_CHUNK_LEN).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn six_hundred_chars_wrap_into_two_retained_chunks() {
        // 86 seven-char words ("loremN " incl. separator) is 601 chars of
        // prose; wrapping at 500 leaves a tail well above the 100-char floor.
        let text = prose(86);
        assert!(text.chars().count() >= 600);

        let chunks = chunk(&text, DEFAULT_CHUNK_WIDTH, DEFAULT_MIN_CHUNK_LEN).unwrap();
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.chars().count() <= 500);
        assert!(chunks[1].text.chars().count() > DEFAULT_MIN_CHUNK_LEN);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[1].index, 1);
    }
}
