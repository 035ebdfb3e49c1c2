//! Remote comment and story bodies are untrusted HTML. Nothing here ever hands
//! markup to the view: everything is reduced to plain text first.

use regex::Regex;
use scraper::{Html, Node};
use std::sync::OnceLock;

fn tag_regex() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("static pattern"))
}

fn whitespace_regex() -> &'static Regex {
    static WS: OnceLock<Regex> = OnceLock::new();
    WS.get_or_init(|| Regex::new(r"\s+").expect("static pattern"))
}

/// Renders a body as text. `<p>` starts a new paragraph, `<br>` a new line,
/// links become their visible text, and script/style content is dropped.
pub fn comment_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());

    for node in fragment.tree.root().descendants() {
        match node.value() {
            Node::Element(element) => match element.name() {
                "p" if !out.is_empty() => push_break(&mut out, "\n\n"),
                "br" => push_break(&mut out, "\n"),
                _ => {}
            },
            Node::Text(text) => {
                let skipped = node.ancestors().any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .is_some_and(|e| matches!(e.name(), "script" | "style"))
                });
                if !skipped {
                    out.push_str(text);
                }
            }
            _ => {}
        }
    }

    out.trim().to_string()
}

fn push_break(out: &mut String, brk: &str) {
    while out.ends_with(' ') {
        out.pop();
    }
    out.push_str(brk);
}

/// One-line summary for collapsed comments, cut to `max_chars` characters.
pub fn preview(html: &str, max_chars: usize) -> String {
    let stripped = tag_regex().replace_all(html, " ");
    let decoded = html_escape::decode_html_entities(&stripped);
    let line = whitespace_regex().replace_all(decoded.trim(), " ");

    if line.chars().count() <= max_chars {
        return line.into_owned();
    }
    let mut cut: String = line.chars().take(max_chars).collect();
    cut.push('…');
    cut
}
