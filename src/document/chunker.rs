use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// One overlapping text window produced by [`TextChunker::chunk_text`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    pub index: usize,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Positional metadata for a chunk, in word offsets over the source text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub word_start: usize,
    pub word_end: usize,
    pub length: usize,
}

/// Splits text into overlapping chunks sized for embedding and retrieval.
///
/// The split is deterministic and stateless: the text is tokenized into
/// whitespace-delimited words and a sliding window walks the word sequence,
/// approximating 5 characters per word to convert the character-based
/// configuration into word counts.
#[derive(Debug, Clone)]
pub struct TextChunker {
    words_per_chunk: usize,
    overlap_words: usize,
}

impl TextChunker {
    /// `chunk_overlap` must be strictly smaller than `chunk_size`; anything
    /// else risks a window that never advances.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(anyhow!("chunk_size must be positive"));
        }
        if chunk_overlap >= chunk_size {
            return Err(anyhow!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                chunk_overlap,
                chunk_size
            ));
        }

        Ok(Self {
            words_per_chunk: (chunk_size / 5).max(1),
            overlap_words: (chunk_overlap / 5).max(1),
        })
    }

    /// Splits `text` into overlapping windows. Empty or whitespace-only input
    /// yields an empty sequence. The function never fails; the final window
    /// may be shorter than the target size.
    pub fn chunk_text(&self, text: &str) -> Vec<TextChunk> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        // Clamp the advance to at least one word so degenerate configurations
        // (overlap rounding up to the window size) still terminate.
        let advance = self
            .words_per_chunk
            .saturating_sub(self.overlap_words)
            .max(1);
        let stop_at = words.len().saturating_sub(self.overlap_words);

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut index = 0;

        while start < words.len() {
            let end = (start + self.words_per_chunk).min(words.len());
            let content = words[start..end].join(" ");

            if !content.trim().is_empty() {
                chunks.push(TextChunk {
                    index,
                    metadata: ChunkMetadata {
                        word_start: start,
                        word_end: end,
                        length: content.len(),
                    },
                    content,
                });
                index += 1;
            }

            start += advance;
            if start >= stop_at {
                break;
            }
        }

        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_text(count: usize) -> String {
        (0..count)
            .map(|i| format!("word{:03}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(TextChunker::new(200, 200).is_err());
        assert!(TextChunker::new(200, 500).is_err());
        assert!(TextChunker::new(0, 0).is_err());
        assert!(TextChunker::new(1000, 200).is_ok());
    }

    #[test]
    fn empty_and_whitespace_input_yield_no_chunks() {
        let chunker = TextChunker::new(1000, 200).unwrap();
        assert!(chunker.chunk_text("").is_empty());
        assert!(chunker.chunk_text("   \n\t  ").is_empty());
    }

    #[test]
    fn short_text_becomes_a_single_chunk() {
        let chunker = TextChunker::new(1000, 200).unwrap();
        let chunks = chunker.chunk_text("just a few words here");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].content, "just a few words here");
        assert_eq!(chunks[0].metadata.word_start, 0);
        assert_eq!(chunks[0].metadata.word_end, 5);
    }

    #[test]
    fn long_text_produces_overlapping_contiguous_chunks() {
        // 240 words of 7 chars each ~ 1900 chars; chunk_size 1000 / overlap
        // 200 gives 200-word windows with a 40-word overlap.
        let text = word_text(240);
        let chunker = TextChunker::new(1000, 200).unwrap();
        let chunks = chunker.chunk_text(&text);

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }

        // Consecutive windows share their overlap region.
        let first_words: Vec<&str> = chunks[0].content.split_whitespace().collect();
        let second_words: Vec<&str> = chunks[1].content.split_whitespace().collect();
        assert_eq!(&first_words[160..200], &second_words[..40]);
    }

    #[test]
    fn metadata_word_span_matches_content() {
        let text = word_text(240);
        let chunker = TextChunker::new(1000, 200).unwrap();
        for chunk in chunker.chunk_text(&text) {
            let words_in_content = chunk.content.split_whitespace().count();
            assert_eq!(
                chunk.metadata.word_end - chunk.metadata.word_start,
                words_in_content
            );
            assert_eq!(chunk.metadata.length, chunk.content.len());
        }
    }

    #[test]
    fn rejoined_chunks_preserve_every_word() {
        let text = word_text(500);
        let chunker = TextChunker::new(1000, 200).unwrap();
        let chunks = chunker.chunk_text(&text);

        // Windows must tile the word sequence without gaps...
        assert_eq!(chunks[0].metadata.word_start, 0);
        for pair in chunks.windows(2) {
            assert!(pair[1].metadata.word_start <= pair[0].metadata.word_end);
        }
        assert_eq!(chunks.last().unwrap().metadata.word_end, 500);

        // ...and carry exactly the original vocabulary (every generated word
        // is distinct, so set equality means nothing was inserted or lost).
        let seen: std::collections::BTreeSet<&str> = chunks
            .iter()
            .flat_map(|c| c.content.split_whitespace())
            .collect();
        let original: std::collections::BTreeSet<&str> =
            text.split_whitespace().collect();
        assert_eq!(seen, original);
    }

    #[test]
    fn degenerate_configuration_still_terminates() {
        // size 6 / overlap 5 both round to a single word, so the advance
        // would be zero without the clamp.
        let chunker = TextChunker::new(6, 5).unwrap();
        let chunks = chunker.chunk_text(&word_text(20));
        assert!(!chunks.is_empty());
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i);
        }
    }
}
