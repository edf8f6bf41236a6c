//! Minimal markup used in agent text: `**bold**`, line breaks and `---`
//! horizontal rules.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Span {
    Plain(String),
    Bold(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(Vec<Span>),
    Rule,
}

/// Splits message content into lines of styled spans.
///
/// An unmatched `**` is kept as literal text.
pub fn parse(content: &str) -> Vec<Line> {
    content
        .lines()
        .map(|line| {
            if line.trim() == "---" {
                Line::Rule
            } else {
                Line::Text(parse_spans(line))
            }
        })
        .collect()
}

fn parse_spans(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut rest = line;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        let Some(end) = after.find("**") else {
            break;
        };
        if start > 0 {
            spans.push(Span::Plain(rest[..start].to_string()));
        }
        if end > 0 {
            spans.push(Span::Bold(after[..end].to_string()));
        }
        rest = &after[end + 2..];
    }
    if !rest.is_empty() {
        spans.push(Span::Plain(rest.to_string()));
    }
    spans
}
