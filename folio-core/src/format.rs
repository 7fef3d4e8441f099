//! Presentational markup for page text. Nothing here feeds back into
//! pagination.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::text::split_paragraphs;

pub const PLACEHOLDER_PAGE_HTML: &str = "<p class=\"placeholder\">This book has no content.</p>";

static BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(\S(?:.*?\S)?)\*\*").expect("valid bold pattern"));
static ITALIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*(\S(?:[^*]*?\S)?)\*").expect("valid italic pattern"));

pub fn format_page(raw: &str) -> String {
    split_paragraphs(raw)
        .into_iter()
        .map(format_paragraph)
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_paragraph(paragraph: &str) -> String {
    let (first_line, rest) = match paragraph.split_once('\n') {
        Some((first, rest)) => (first.trim(), Some(rest)),
        None => (paragraph.trim(), None),
    };

    let heading = if let Some(text) = first_line.strip_prefix("## ") {
        Some(format!("<h2>{}</h2>", inline(text.trim())))
    } else {
        first_line
            .strip_prefix("# ")
            .map(|text| format!("<h1>{}</h1>", inline(text.trim())))
    };

    match (heading, rest) {
        (Some(heading), Some(rest)) if !rest.trim().is_empty() => {
            format!("{}\n{}", heading, body(rest))
        }
        (Some(heading), _) => heading,
        (None, _) => body(paragraph),
    }
}

fn body(text: &str) -> String {
    let joined = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!("<p>{}</p>", inline(&joined))
}

fn inline(text: &str) -> String {
    let escaped = escape_html(text);
    let bolded = BOLD.replace_all(&escaped, "<strong>$1</strong>");
    ITALIC.replace_all(&bolded, "<em>$1</em>").into_owned()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use insta::assert_snapshot;

    #[test]
    fn renders_headings_and_emphasis() {
        let raw = "# Hello\n\n## A *small* start\n\nSome **bold** and *italic* words\nwrapped here.";
        assert_snapshot!(format_page(raw), @r###"
        <h1>Hello</h1>
        <h2>A <em>small</em> start</h2>
        <p>Some <strong>bold</strong> and <em>italic</em> words wrapped here.</p>
        "###);
    }

    #[test]
    fn heading_followed_by_lines_in_same_paragraph() {
        let raw = "# Title\nauthor: Someone";
        assert_snapshot!(format_page(raw), @r###"
        <h1>Title</h1>
        <p>author: Someone</p>
        "###);
    }

    #[test]
    fn escapes_markup_characters() {
        assert_eq!(
            format_page("5 < 6 & \"x\" > y"),
            "<p>5 &lt; 6 &amp; &quot;x&quot; &gt; y</p>"
        );
    }

    #[test]
    fn lone_asterisks_are_left_alone() {
        assert_eq!(format_page("2 * 3 = 6"), "<p>2 * 3 = 6</p>");
        assert_eq!(format_page("# "), "<p>#</p>");
    }
}
