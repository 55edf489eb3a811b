use crate::domain::model::PageContent;
use regex::{Regex, RegexBuilder};
use scraper::{Html, Node, Selector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// "engineer" matches "engineering".
    #[default]
    Substring,
    /// Term must be delimited by non-word characters.
    WordBoundary,
}

#[derive(Debug, Clone)]
struct Keyword {
    term: String,
    pattern: Regex,
}

/// Ordered, case-insensitive search terms shared by every startup.
#[derive(Debug, Clone)]
pub struct KeywordSet {
    keywords: Vec<Keyword>,
    mode: MatchMode,
}

impl KeywordSet {
    pub fn new<I, S>(terms: I, mode: MatchMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keywords: Vec<Keyword> = Vec::new();
        for term in terms {
            let term = term.as_ref().trim();
            if term.is_empty() {
                continue;
            }
            let folded = term.to_lowercase();
            if keywords.iter().any(|k| k.term.to_lowercase() == folded) {
                continue;
            }

            let escaped = regex::escape(term);
            let source = match mode {
                MatchMode::Substring => escaped,
                MatchMode::WordBoundary => word_bounded(term, &escaped),
            };
            // 字面字串已跳脫，只有超過大小上限時才會失敗
            let Ok(pattern) = RegexBuilder::new(&source).case_insensitive(true).build() else {
                tracing::warn!(term = %term, "Skipping keyword that cannot be compiled");
                continue;
            };
            keywords.push(Keyword {
                term: term.to_string(),
                pattern,
            });
        }
        Self { keywords, mode }
    }

    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(|k| k.term.as_str())
    }

    /// Every keyword found at least once, in set order, each reported once.
    pub fn scan(&self, text: &str) -> Vec<String> {
        self.keywords
            .iter()
            .filter(|k| k.pattern.is_match(text))
            .map(|k| k.term.clone())
            .collect()
    }

    /// 掃描頁面的可見文字；取不到文字時視為零命中
    pub fn scan_page(&self, content: &PageContent) -> Vec<String> {
        match visible_text(content) {
            Some(text) => self.scan(&text),
            None => {
                tracing::debug!(url = %content.url, "No readable text, zero keyword hits");
                Vec::new()
            }
        }
    }
}

/// `\b` only holds next to a word character, so an edge like the `+` in
/// "c++" or the `.` in ".net" is bounded by start/end or a non-word character.
fn word_bounded(term: &str, escaped: &str) -> String {
    let is_word = |c: Option<char>| c.is_some_and(|c| c.is_alphanumeric() || c == '_');
    let head = if is_word(term.chars().next()) { r"\b" } else { r"(?:^|\W)" };
    let tail = if is_word(term.chars().last()) { r"\b" } else { r"(?:$|\W)" };
    format!("{}{}{}", head, escaped, tail)
}

const HIDDEN_TAGS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Body text without script/style content, whitespace-collapsed.
pub fn visible_text(content: &PageContent) -> Option<String> {
    if content.is_blank() {
        return None;
    }

    let document = Html::parse_document(&content.html);
    let body_selector = Selector::parse("body").ok()?;
    let root = document
        .select(&body_selector)
        .next()
        .unwrap_or_else(|| document.root_element());

    let mut parts: Vec<&str> = Vec::new();
    for node in root.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_TAGS.contains(&el.name()))
        });
        if !hidden {
            parts.push(text);
        }
    }

    let text = crate::core::links::normalize_whitespace(&parts.join(" "));
    (!text.is_empty()).then_some(text)
}
