use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, StopWordFilter, TextAnalyzer, TokenStream};

const MIN_TERM_CHARS: usize = 3;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it", "its", "of", "on", "that", "the", "to",
    "was", "will", "with", "or", "but", "not", "this", "these", "they", "them", "their", "there", "then", "than", "so", "if", "when", "where",
    "why", "how", "what", "which", "who", "whom", "whose", "can", "could", "should", "would", "may", "might", "must", "shall", "do", "does",
    "did", "have", "had", "having", "were", "been", "being", "our", "we", "us", "also", "however", "thus", "therefore", "while", "both",
    "each", "other", "into", "such", "more", "most", "less", "between", "within", "during", "after", "before", "among", "across", "under",
    "over", "about", "through", "per", "via", "all", "any", "only", "well", "one", "two", "three", "those", "here", "very", "using", "used",
    "use", "based", "shown", "showed", "show", "found", "study", "studies", "paper", "article", "results", "result", "figure", "fig",
    "table", "data", "analysis", "effect", "effects", "significant", "significantly", "compared", "observed", "increased", "decreased",
    "et", "al", "level", "levels", "group", "groups", "total", "time", "new", "high", "low",
];

/// Lowercasing, stop-word filtering analyzer for cluster labels.
#[derive(Clone)]
pub struct LabelAnalyzer {
    analyzer: TextAnalyzer,
}

impl Default for LabelAnalyzer {
    fn default() -> Self { Self::new() }
}

impl LabelAnalyzer {
    pub fn new() -> Self {
        let analyzer = TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(40))
            .filter(LowerCaser)
            .filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
            .build();
        Self { analyzer }
    }

    /// Label candidates in `text`: at least three characters, no digits.
    pub fn terms(&mut self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut stream = self.analyzer.token_stream(text);
        while stream.advance() {
            let term = &stream.token().text;
            if term.chars().count() >= MIN_TERM_CHARS && !term.chars().any(|c| c.is_ascii_digit()) {
                out.push(term.clone());
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stop_words_short_tokens_and_numbers() {
        let mut a = LabelAnalyzer::new();
        let terms = a.terms("The Effects of Microgravity on Bone: 2019 study of 12 mice in ISS");
        assert_eq!(terms, vec!["microgravity", "bone", "mice", "iss"]);
    }
}
