//! SentenceSource: an ordered finite sequence of sentence strings. EPUB
//! extraction and subtitle parsing are external collaborators; this module
//! carries the trait plus one concrete adapter sufficient to run the
//! pipeline end-to-end without a real document parser.

use crate::model::Sentence;

pub trait SentenceSource: Send + Sync {
    fn sentences(&self) -> Vec<Sentence>;
}

/// Splits pre-segmented input text on newlines, one sentence per non-blank
/// line, numbering sequentially from 1.
pub struct LineSentenceSource {
    lines: Vec<String>,
}

impl LineSentenceSource {
    pub fn new(text: &str) -> Self {
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self { lines }
    }
}

impl SentenceSource for LineSentenceSource {
    fn sentences(&self) -> Vec<Sentence> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, text)| Sentence { index: i, number: i + 1, text: text.clone() })
            .collect()
    }
}
