use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;

static PARAGRAPH_BREAK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("valid paragraph break pattern"));
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"[.!?]+["'”’)\]]*(\s+)"#).expect("valid sentence boundary pattern")
});

/// Paragraphs separated by blank lines, trimmed, empty ones dropped.
pub fn split_paragraphs(text: &str) -> Vec<&str> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Byte ranges of the sentences in `paragraph`. A sentence ends at `.`, `!`
/// or `?` followed by whitespace; text after the last terminator forms a
/// final sentence. Ranges exclude surrounding whitespace.
pub fn sentence_spans(paragraph: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    for caps in SENTENCE_END.captures_iter(paragraph) {
        let Some(gap) = caps.get(1) else {
            continue;
        };
        push_trimmed(paragraph, start..gap.start(), &mut spans);
        start = gap.end();
    }
    push_trimmed(paragraph, start..paragraph.len(), &mut spans);
    spans
}

pub fn split_sentences(paragraph: &str) -> Vec<&str> {
    sentence_spans(paragraph)
        .into_iter()
        .map(|span| &paragraph[span])
        .collect()
}

fn push_trimmed(text: &str, span: Range<usize>, spans: &mut Vec<Range<usize>>) {
    let slice = &text[span.clone()];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    if leading + trailing < slice.len() {
        spans.push(span.start + leading..span.end - trailing);
    }
}
