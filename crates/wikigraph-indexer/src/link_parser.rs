//! Link extraction from document text
//!
//! Two syntaxes are recognised:
//! - wiki links `[[Target]]`, `[[Target#Heading]]`, `[[Target|Alias]]`
//! - markdown links `[text](relative/path.md)`
//!
//! Links inside fenced code blocks and inline code are ignored, as are
//! embeds (`![[...]]`, `![alt](...)`), escaped wiki links (`\[[...]]`) and
//! external URLs.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use wikigraph_core::{DocPath, LinkSyntax};

static WIKILINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\[([^\]\n]+)\]\]").unwrap()
});

static MARKDOWN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[[^\]\n]*\]\(\s*(<[^>\n]*>|[^)\s]+)(?:\s+"[^"\n]*")?\s*\)"#).unwrap()
});

static FENCED_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[^\n]*\n.*?```|~~~[^\n]*\n.*?~~~").unwrap()
});

static INLINE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"`[^`\n]*`").unwrap()
});

static URL_SCHEME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Wiki,
    Markdown,
}

/// One link found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOccurrence {
    /// Target with anchor, alias and markdown decoration removed.
    pub target: String,
    pub kind: LinkKind,
    /// Byte range of the whole link in the source text.
    pub span: Range<usize>,
}

impl LinkOccurrence {
    /// The target as handed to the index.
    ///
    /// Markdown targets are paths relative to `source` and become corpus-absolute;
    /// wiki targets stay as written so the name resolver can look them up.
    pub fn index_target(&self, source: &DocPath) -> String {
        match self.kind {
            LinkKind::Wiki => self.target.clone(),
            LinkKind::Markdown if DocPath::is_absolute_target(&self.target) => {
                DocPath::new(&self.target).to_string()
            }
            LinkKind::Markdown => source.join_relative(&self.target).to_string(),
        }
    }
}

fn build_excluded_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = FENCED_CODE_RE.find_iter(text).map(|m| m.range()).collect();
    for m in INLINE_CODE_RE.find_iter(text) {
        if !ranges.iter().any(|r| r.contains(&m.start())) {
            ranges.push(m.range());
        }
    }
    ranges
}

fn is_excluded(offset: usize, excluded: &[Range<usize>]) -> bool {
    excluded.iter().any(|r| r.contains(&offset))
}

fn preceded_by(text: &str, offset: usize, c: char) -> bool {
    text[..offset].ends_with(c)
}

/// All links of the enabled syntaxes, in order of appearance.
pub fn extract_links(text: &str, syntax: LinkSyntax) -> Vec<LinkOccurrence> {
    let excluded = build_excluded_ranges(text);
    let mut links = Vec::new();

    if syntax.wiki() {
        for cap in WIKILINK_RE.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            if is_excluded(whole.start(), &excluded)
                || preceded_by(text, whole.start(), '!')
                || preceded_by(text, whole.start(), '\\')
            {
                continue;
            }
            let Some(target) = wiki_target(&cap[1]) else {
                continue;
            };
            links.push(LinkOccurrence {
                target,
                kind: LinkKind::Wiki,
                span: whole.range(),
            });
        }
    }

    if syntax.markdown() {
        for cap in MARKDOWN_LINK_RE.captures_iter(text) {
            let Some(whole) = cap.get(0) else { continue };
            if is_excluded(whole.start(), &excluded) || preceded_by(text, whole.start(), '!') {
                continue;
            }
            // `[[x]](y)` is a wiki link followed by text, not a markdown link.
            if text[whole.start()..].starts_with("[[") {
                continue;
            }
            let Some(target) = markdown_target(&cap[1]) else {
                continue;
            };
            links.push(LinkOccurrence {
                target,
                kind: LinkKind::Markdown,
                span: whole.range(),
            });
        }
    }

    links.sort_by_key(|l| l.span.start);
    links
}

/// Targets in order of appearance, ready for `DocumentUpdate::targets`.
pub fn extract_targets(text: &str, syntax: LinkSyntax, source: &DocPath) -> Vec<String> {
    extract_links(text, syntax)
        .iter()
        .map(|l| l.index_target(source))
        .collect()
}

fn wiki_target(inner: &str) -> Option<String> {
    let end = inner
        .find('#')
        .unwrap_or(inner.len())
        .min(inner.find('|').unwrap_or(inner.len()));
    let name = inner[..end].trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn markdown_target(raw: &str) -> Option<String> {
    let raw = raw
        .trim()
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim();
    if URL_SCHEME_RE.is_match(raw) {
        return None;
    }
    let path = raw.split('#').next().unwrap_or_default();
    let path = path.replace("%20", " ");
    let path = path.trim();
    (!path.is_empty()).then(|| path.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(text: &str, syntax: LinkSyntax) -> Vec<String> {
        extract_links(text, syntax)
            .into_iter()
            .map(|l| l.target)
            .collect()
    }

    #[test]
    fn test_wiki_links_strip_anchor_and_alias() {
        let text = "[[One]] then [[Two#Heading]] and [[Three|shown]] and [[Four#h|a]]";
        assert_eq!(targets(text, LinkSyntax::Wiki), vec!["One", "Two", "Three", "Four"]);
    }

    #[test]
    fn test_embeds_and_escapes_are_skipped() {
        let text = "![[image.png]] \\[[Literal]] [[Real]]";
        assert_eq!(targets(text, LinkSyntax::Wiki), vec!["Real"]);
    }

    #[test]
    fn test_code_is_ignored() {
        let text = "```\n[[InFence]]\n```\nSee `[[Inline]]` but [[Real]]";
        assert_eq!(targets(text, LinkSyntax::Wiki), vec!["Real"]);
    }

    #[test]
    fn test_empty_wiki_links_are_skipped() {
        assert!(targets("[[ ]] [[#only-heading]] [[|alias]]", LinkSyntax::Wiki).is_empty());
    }

    #[test]
    fn test_markdown_links() {
        let text = "[a](notes/B.md) [b](<My Note.md>) [c](Other%20Note.md#part) [d](#local)";
        assert_eq!(
            targets(text, LinkSyntax::Markdown),
            vec!["notes/B.md", "My Note.md", "Other Note.md"]
        );
    }

    #[test]
    fn test_markdown_skips_images_and_urls() {
        let text = "![pic](img.png) [site](https://example.com) [mail](mailto:a@b.c) [ok](Ok.md)";
        assert_eq!(targets(text, LinkSyntax::Markdown), vec!["Ok.md"]);
    }

    #[test]
    fn test_syntax_modes() {
        let text = "[[Wiki]] and [md](Md.md)";
        assert_eq!(targets(text, LinkSyntax::Wiki), vec!["Wiki"]);
        assert_eq!(targets(text, LinkSyntax::Markdown), vec!["Md.md"]);
        assert_eq!(targets(text, LinkSyntax::Both), vec!["Wiki", "Md.md"]);
    }

    #[test]
    fn test_spans_cover_whole_link() {
        let text = "See [[Foo|bar]] and [x](y.md)";
        let links = extract_links(text, LinkSyntax::Both);
        assert_eq!(&text[links[0].span.clone()], "[[Foo|bar]]");
        assert_eq!(&text[links[1].span.clone()], "[x](y.md)");
    }

    #[test]
    fn test_markdown_targets_become_absolute() {
        let source = DocPath::new("/notes/daily/Today.md");
        let text = "[up](../Ideas.md) [here](Sibling.md) [root](/Top.md) [[Wiki]]";
        assert_eq!(
            extract_targets(text, LinkSyntax::Both, &source),
            vec!["/notes/Ideas.md", "/notes/daily/Sibling.md", "/Top.md", "Wiki"]
        );
    }
}
