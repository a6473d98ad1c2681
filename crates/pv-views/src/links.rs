//! Link detection for free-text cells
//!
//! Cell text is cleaned of embedded markup, duplicate domain/URL pairs are
//! collapsed, and URLs, e-mail addresses and bare domains are turned into
//! anchors. Everything that is not a recognized link is HTML-escaped, so
//! the markup never carries user content through verbatim.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(?:!|/?([A-Za-z][A-Za-z0-9-]*))[^<>]*>").unwrap());

static UNTERMINATED_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<\s*/?\s*(?:a|span|div|p|b|i|u|em|strong|font|br|img)\b[^<>]*$").unwrap()
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?:^|\s)(?:href|style|class|target|rel|id|title|data-[a-z0-9_-]+)\s*=\s*(?:"[^"]*"?|'[^']*'?|[^\s>]+)"#,
    )
    .unwrap()
});

static QUOTE_REMNANT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"["']\s*/?>"#).unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)https?://[^\s<>"']+"#).unwrap());

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").unwrap());

static DOMAIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}(?:/[^\s<>"']*)?"#).unwrap()
});

static BARE_DOMAIN_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}(?:/[^\s<>"']*)?$"#).unwrap()
});

/// Punctuation that ends a sentence rather than a link
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')'];

/// Tags that separate words when removed
const BLOCK_TAGS: &[&str] = &[
    "br", "p", "div", "li", "ul", "ol", "tr", "td", "th", "table", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Outcome of [`render`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered<'a> {
    /// Nothing changed; show the original text as-is
    Plain(&'a str),
    /// Sanitized HTML
    Markup(String),
}

impl Rendered<'_> {
    pub fn as_str(&self) -> &str {
        match self {
            Rendered::Plain(text) => text,
            Rendered::Markup(html) => html,
        }
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, Rendered::Markup(_))
    }

    /// Whether at least one anchor was produced
    pub fn has_links(&self) -> bool {
        // Text segments are escaped, so a literal anchor can only be ours
        matches!(self, Rendered::Markup(html) if html.contains("<a href="))
    }
}

/// Sanitize a cell and linkify it
pub fn render(text: &str) -> Rendered<'_> {
    let cleaned = deduplicate_links(&sanitize(text));
    let segments = linkify(&cleaned);

    let has_links = segments.iter().any(|s| matches!(s, Segment::Link { .. }));
    if !has_links && cleaned == text {
        return Rendered::Plain(text);
    }

    Rendered::Markup(segments.iter().map(Segment::to_html).collect())
}

/// Strip markup, attribute debris and redundant whitespace
pub fn sanitize(text: &str) -> String {
    let mut current = decode_entities(text);
    // Removing one tag can expose another
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(text: &str) -> String {
    let stripped = TAG.replace_all(text, |caps: &Captures| {
        let is_block = caps
            .get(1)
            .is_some_and(|name| BLOCK_TAGS.iter().any(|tag| tag.eq_ignore_ascii_case(name.as_str())));
        if is_block { " " } else { "" }
    });
    let stripped = UNTERMINATED_TAG.replace_all(&stripped, "");
    let stripped = ATTRIBUTE.replace_all(&stripped, " ");
    let stripped = QUOTE_REMNANT.replace_all(&stripped, " ");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Lower-cased link without scheme, leading `www.` or trailing `/`
fn canonical(token: &str) -> String {
    let token = token.trim_end_matches(TRAILING_PUNCTUATION).to_lowercase();
    let token = token
        .strip_prefix("https://")
        .or_else(|| token.strip_prefix("http://"))
        .unwrap_or(&token);
    let token = token.strip_prefix("www.").unwrap_or(token);
    token.trim_end_matches('/').to_string()
}

fn is_url(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn is_bare_domain(token: &str) -> bool {
    let token = token.trim_end_matches(TRAILING_PUNCTUATION);
    !token.contains("://") && !token.contains('@') && BARE_DOMAIN_TOKEN.is_match(token)
}

fn is_link_token(token: &str) -> bool {
    is_url(token) || is_bare_domain(token) || EMAIL.is_match(token)
}

/// Drop bare domains that repeat a full URL of the same cell, and adjacent
/// copies of the same link
fn deduplicate_links(text: &str) -> String {
    let tokens: Vec<&str> = text.split(' ').filter(|t| !t.is_empty()).collect();

    let urls: Vec<String> = tokens.iter().filter(|t| is_url(t)).map(|t| canonical(t)).collect();
    let hosts: Vec<&str> = urls.iter().map(|u| u.split('/').next().unwrap_or(u)).collect();

    let mut kept: Vec<&str> = Vec::with_capacity(tokens.len());
    for token in tokens {
        if is_bare_domain(token) {
            let bare = canonical(token);
            let duplicates_url = urls.iter().any(|u| *u == bare)
                || (!bare.contains('/') && hosts.iter().any(|h| *h == bare));
            if duplicates_url {
                continue;
            }
        }
        if is_link_token(token) && kept.last().is_some_and(|last| *last == token) {
            continue;
        }
        kept.push(token);
    }

    kept.join(" ")
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Link { href: String, label: String, external: bool },
}

impl Segment {
    fn to_html(&self) -> String {
        match self {
            Segment::Text(text) => escape_html(text),
            Segment::Link { href, label, external: true } => format!(
                r#"<a href="{}" target="_blank" rel="noopener noreferrer">{}</a>"#,
                escape_html(href),
                escape_html(label)
            ),
            Segment::Link { href, label, external: false } => {
                format!(r#"<a href="{}">{}</a>"#, escape_html(href), escape_html(label))
            }
        }
    }
}

/// URLs first, then e-mails, then bare domains; each pass only sees plain text
fn linkify(text: &str) -> Vec<Segment> {
    let mut segments = vec![Segment::Text(text.to_string())];

    segments = split_links(segments, &URL, |_, _| true, |m| (m.to_string(), true));
    segments = split_links(segments, &EMAIL, |_, _| true, |m| (format!("mailto:{m}"), false));
    segments = split_links(
        segments,
        &DOMAIN,
        |text, range| {
            let before = text[..range.start].chars().next_back();
            let after = text[range.end..].chars().next();
            !matches!(before, Some('@' | '.' | '/' | ':' | '-' | '_'))
                && !matches!(after, Some('@' | '-' | '_'))
        },
        |m| (format!("https://{m}"), true),
    );

    segments
}

fn split_links(
    segments: Vec<Segment>,
    pattern: &Regex,
    accept: impl Fn(&str, &std::ops::Range<usize>) -> bool,
    target: impl Fn(&str) -> (String, bool),
) -> Vec<Segment> {
    let mut out = Vec::with_capacity(segments.len());

    for segment in segments {
        let text = match segment {
            Segment::Text(text) => text,
            link => {
                out.push(link);
                continue;
            }
        };

        let mut cursor = 0;
        for found in pattern.find_iter(&text) {
            let matched = found.as_str().trim_end_matches(TRAILING_PUNCTUATION);
            let range = found.start()..found.start() + matched.len();
            if matched.is_empty() || !accept(&text, &range) {
                continue;
            }

            if range.start > cursor {
                out.push(Segment::Text(text[cursor..range.start].to_string()));
            }
            let (href, external) = target(matched);
            out.push(Segment::Link {
                href,
                label: matched.to_string(),
                external,
            });
            cursor = range.end;
        }

        if cursor < text.len() {
            out.push(Segment::Text(text[cursor..].to_string()));
        }
    }

    out
}
