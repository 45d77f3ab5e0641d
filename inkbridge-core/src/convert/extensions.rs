//! Markup extensions applied around the generic conversion engines
//!
//! Each extension is a pure, named text rewrite bound to one stage of the
//! pipeline. The converter runs them in registration order, so the set is
//! deterministic in both directions.

use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

use super::to_markdown::image_markdown;

/// Where in the conversion pipeline an extension runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Markdown input, before Markdown→HTML
    MarkdownSource,
    /// HTML output, after Markdown→HTML
    HtmlOutput,
    /// Editor HTML, before HTML→Markdown
    HtmlSource,
    /// Markdown output, after HTML→Markdown
    MarkdownOutput,
}

/// A pure `(text) -> text` rewrite rule with a stable name
pub trait MarkupExtension: Send + Sync {
    fn name(&self) -> &str;

    fn stage(&self) -> Stage;

    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str>;
}

/// Keeps a list visually attached to the paragraph before it
#[derive(Debug, Default)]
pub struct ListSpacingFix;

impl MarkupExtension for ListSpacingFix {
    fn name(&self) -> &str {
        "list-spacing"
    }

    fn stage(&self) -> Stage {
        Stage::HtmlOutput
    }

    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if text.contains("</p>\n<ul>") {
            Cow::Owned(text.replace("</p>\n<ul>", "</p><p><ul>"))
        } else {
            Cow::Borrowed(text)
        }
    }
}

/// The inline-ad sentinel.
///
/// Stored content carries only the sentinel paragraph; the placeholder
/// image it stands for is resolved from configuration when rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdPlaceholder {
    pub image_url: String,
    pub alt: String,
}

impl AdPlaceholder {
    pub const NAME: &'static str = "inline-ad";

    /// Marker stored in the Markdown body
    pub const SENTINEL: &'static str = r#"<p class="inline ad"></p>"#;

    pub fn new<U: Into<String>, A: Into<String>>(image_url: U, alt: A) -> Self {
        Self {
            image_url: image_url.into(),
            alt: alt.into(),
        }
    }

    /// Editor HTML shown in place of the sentinel
    pub fn expanded_html(&self) -> String {
        format!(
            r#"<p><img src="{}" alt="{}"></p>"#,
            html_escape::encode_double_quoted_attribute(&self.image_url),
            html_escape::encode_double_quoted_attribute(&self.alt)
        )
    }

    /// Markdown the generic converter emits for the placeholder image
    pub fn image_markdown(&self) -> String {
        image_markdown(&self.alt, &self.image_url, None)
    }
}

/// Expands the ad sentinel into its placeholder image
#[derive(Debug)]
pub struct AdPlaceholderExpansion {
    placeholder: AdPlaceholder,
}

impl AdPlaceholderExpansion {
    pub fn new(placeholder: AdPlaceholder) -> Self {
        Self { placeholder }
    }
}

impl MarkupExtension for AdPlaceholderExpansion {
    fn name(&self) -> &str {
        "ad-placeholder-expansion"
    }

    fn stage(&self) -> Stage {
        Stage::HtmlOutput
    }

    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if text.contains(AdPlaceholder::SENTINEL) {
            Cow::Owned(text.replace(AdPlaceholder::SENTINEL, &self.placeholder.expanded_html()))
        } else {
            Cow::Borrowed(text)
        }
    }
}

/// Turns the placeholder image markup back into the sentinel
#[derive(Debug)]
pub struct AdPlaceholderContraction {
    needle: String,
}

impl AdPlaceholderContraction {
    pub fn new(placeholder: &AdPlaceholder) -> Self {
        Self {
            needle: placeholder.image_markdown(),
        }
    }
}

impl MarkupExtension for AdPlaceholderContraction {
    fn name(&self) -> &str {
        "ad-placeholder-contraction"
    }

    fn stage(&self) -> Stage {
        Stage::MarkdownOutput
    }

    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if text.contains(&self.needle) {
            Cow::Owned(text.replace(&self.needle, AdPlaceholder::SENTINEL))
        } else {
            Cow::Borrowed(text)
        }
    }
}

/// HTML the widget renders for an empty document
pub const BLANK_DOCUMENT_HTML: &str = "<p><br></p>";

/// Replaces the widget's blank document with a placeholder that keeps its
/// vertical whitespace
#[derive(Debug)]
pub struct BlankLineInterception {
    placeholder_html: String,
}

impl BlankLineInterception {
    pub fn new<S: Into<String>>(placeholder_html: S) -> Self {
        Self {
            placeholder_html: placeholder_html.into(),
        }
    }
}

impl MarkupExtension for BlankLineInterception {
    fn name(&self) -> &str {
        "blank-line-interception"
    }

    fn stage(&self) -> Stage {
        Stage::HtmlSource
    }

    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if text.trim() == BLANK_DOCUMENT_HTML {
            Cow::Owned(self.placeholder_html.clone())
        } else {
            Cow::Borrowed(text)
        }
    }
}

/// Treats single newlines inside a paragraph as hard breaks
#[derive(Debug, Default)]
pub struct LineBreakMode;

impl MarkupExtension for LineBreakMode {
    fn name(&self) -> &str {
        "line-break-mode"
    }

    fn stage(&self) -> Stage {
        Stage::MarkdownSource
    }

    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let lines: Vec<&str> = text.split('\n').collect();
        let mut out = String::with_capacity(text.len() + 16);
        let mut fence: Option<&str> = None;
        let mut indented_code = false;
        let mut after_blank = true;
        let mut changed = false;

        for (i, line) in lines.iter().enumerate() {
            let trimmed = line.trim_start();
            let blank = trimmed.is_empty();
            out.push_str(line);

            if let Some(marker) = fence {
                if trimmed.starts_with(marker) {
                    fence = None;
                }
            } else if let Some(marker) = fence_marker(trimmed) {
                fence = Some(marker);
            } else if indented_code && (blank || indent_width(line) >= 4) {
                // Still inside an indented code block
            } else if after_blank && indent_width(line) >= 4 {
                // Indented code cannot interrupt a paragraph, only follow a blank line
                indented_code = true;
            } else {
                indented_code = false;
                if let Some(next) = lines.get(i + 1) {
                    if breaks_softly(line) && continues_paragraph(next) {
                        out.push_str("  ");
                        changed = true;
                    }
                }
            }
            after_blank = blank;

            if i + 1 < lines.len() {
                out.push('\n');
            }
        }

        if changed {
            Cow::Owned(out)
        } else {
            Cow::Borrowed(text)
        }
    }
}

/// Leading indentation in columns, tabs advancing to the next multiple of four
fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            ' ' => width += 1,
            '\t' => width += 4 - width % 4,
            _ => break,
        }
    }
    width
}

fn fence_marker(trimmed: &str) -> Option<&'static str> {
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// Whether `line` is paragraph text ending in a soft break
fn breaks_softly(line: &str) -> bool {
    let trimmed = line.trim_start();
    !line.trim().is_empty()
        && !line.ends_with("  ")
        && !line.ends_with('\\')
        && !is_heading(trimmed)
        && !is_thematic_break(trimmed)
        && !is_setext_underline(trimmed)
        && !is_table_row(trimmed)
        && !trimmed.starts_with('<')
        && !trimmed.starts_with('>')
}

/// Whether `line` would be a lazy continuation of the paragraph above it
fn continues_paragraph(line: &str) -> bool {
    let trimmed = line.trim_start();
    !trimmed.is_empty()
        && !is_heading(trimmed)
        && !is_thematic_break(trimmed)
        && !is_setext_underline(trimmed)
        && !is_table_row(trimmed)
        && !is_list_marker(trimmed)
        && fence_marker(trimmed).is_none()
        && !trimmed.starts_with('<')
        && !trimmed.starts_with('>')
}

fn is_heading(trimmed: &str) -> bool {
    let hashes = trimmed.chars().take_while(|&c| c == '#').count();
    (1..=6).contains(&hashes) && trimmed[hashes..].chars().next().map_or(true, |c| c == ' ')
}

fn is_thematic_break(trimmed: &str) -> bool {
    ['-', '*', '_'].iter().any(|&marker| {
        trimmed.chars().filter(|&c| c == marker).count() >= 3
            && trimmed.chars().all(|c| c == marker || c == ' ')
    })
}

fn is_setext_underline(trimmed: &str) -> bool {
    let trimmed = trimmed.trim_end();
    !trimmed.is_empty() && (trimmed.chars().all(|c| c == '=') || trimmed.chars().all(|c| c == '-'))
}

fn is_table_row(trimmed: &str) -> bool {
    trimmed.starts_with('|')
        || (trimmed.contains('|') && trimmed.chars().all(|c| matches!(c, '|' | '-' | ':' | ' ')))
}

fn is_list_marker(trimmed: &str) -> bool {
    if let Some(rest) = trimmed.strip_prefix(['-', '+', '*']) {
        return rest.is_empty() || rest.starts_with(' ');
    }
    let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
    if (1..=9).contains(&digits) {
        let rest = &trimmed[digits..];
        if let Some(rest) = rest.strip_prefix(['.', ')']) {
            return rest.is_empty() || rest.starts_with(' ');
        }
    }
    false
}

/// URL schemes every configuration allows
pub const DEFAULT_PROTOCOLS: &[&str] = &["http", "https", "mailto", "tel"];

/// Protocol allow-list for link and image URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPolicy {
    allowed: Vec<String>,
}

impl LinkPolicy {
    /// Default allow-list plus custom schemes such as an internal `action` protocol
    pub fn with_extra(extra: &[String]) -> Self {
        let mut allowed: Vec<String> = DEFAULT_PROTOCOLS.iter().map(|p| p.to_string()).collect();
        for scheme in extra {
            let scheme = scheme.to_ascii_lowercase();
            if !allowed.contains(&scheme) {
                allowed.push(scheme);
            }
        }
        Self { allowed }
    }

    /// Relative URLs and fragments are always allowed
    pub fn is_allowed(&self, url: &str) -> bool {
        match url_scheme(url) {
            Some(scheme) => self.allowed.iter().any(|allowed| *allowed == scheme),
            None => true,
        }
    }

    pub fn allowed_protocols(&self) -> &[String] {
        &self.allowed
    }
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self::with_extra(&[])
    }
}

/// Lowercased scheme of an absolute URL
pub fn url_scheme(url: &str) -> Option<String> {
    let url = url.trim();
    let colon = url.find(':')?;
    let scheme = &url[..colon];
    let valid = scheme.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then(|| scheme.to_ascii_lowercase())
}

static URL_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(href|src)="([^"]*)""#).expect("URL attribute pattern is valid")
});

/// Blanks `href`/`src` attributes whose scheme is not allowed
#[derive(Debug)]
pub struct LinkSanitizer {
    policy: LinkPolicy,
}

impl LinkSanitizer {
    pub fn new(policy: LinkPolicy) -> Self {
        Self { policy }
    }
}

impl MarkupExtension for LinkSanitizer {
    fn name(&self) -> &str {
        "link-sanitizer"
    }

    fn stage(&self) -> Stage {
        Stage::HtmlOutput
    }

    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        URL_ATTRIBUTE.replace_all(text, |caps: &Captures| {
            let url = html_escape::decode_html_entities(&caps[2]);
            if self.policy.is_allowed(&url) {
                caps[0].to_string()
            } else {
                tracing::debug!("Stripped disallowed URL from {} attribute", &caps[1]);
                format!(r#"{}="""#, &caps[1])
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_spacing_fix() {
        let html = "<p>Intro</p>\n<ul>\n<li>a</li>\n</ul>";
        assert_eq!(
            ListSpacingFix.apply(html),
            "<p>Intro</p><p><ul>\n<li>a</li>\n</ul>"
        );
        assert!(matches!(ListSpacingFix.apply("<p>x</p>"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_ad_placeholder_expands_and_contracts() {
        let placeholder = AdPlaceholder::new("https://cdn.example/ad.png?h=250", "Ad Placeholder");

        let expanded = AdPlaceholderExpansion::new(placeholder.clone())
            .apply("<p>a</p>\n<p class=\"inline ad\"></p>");
        assert_eq!(
            expanded,
            "<p>a</p>\n<p><img src=\"https://cdn.example/ad.png?h=250\" alt=\"Ad Placeholder\"></p>"
        );

        let contracted = AdPlaceholderContraction::new(&placeholder)
            .apply("a\n\n![Ad Placeholder](https://cdn.example/ad.png?h=250)");
        assert_eq!(contracted, "a\n\n<p class=\"inline ad\"></p>");
    }

    #[test]
    fn test_contraction_ignores_other_images() {
        let placeholder = AdPlaceholder::new("https://cdn.example/ad.png", "Ad Placeholder");
        let text = "![Ad Placeholder](https://cdn.example/other.png)";
        assert_eq!(AdPlaceholderContraction::new(&placeholder).apply(text), text);
    }

    #[test]
    fn test_blank_line_interception() {
        let ext = BlankLineInterception::new("<p><br>&nbsp;<br></p>");
        assert_eq!(ext.apply("<p><br></p>"), "<p><br>&nbsp;<br></p>");
        assert_eq!(ext.apply("<p>text</p>"), "<p>text</p>");
    }

    #[test]
    fn test_line_break_mode() {
        assert_eq!(LineBreakMode.apply("one\ntwo"), "one  \ntwo");
        assert_eq!(LineBreakMode.apply("one\n\ntwo"), "one\n\ntwo");
        assert_eq!(LineBreakMode.apply("# Title\ntext"), "# Title\ntext");
        assert_eq!(LineBreakMode.apply("- a\n- b"), "- a\n- b");
        assert_eq!(LineBreakMode.apply("- a\n  b"), "- a  \n  b");
        assert_eq!(LineBreakMode.apply("```\na\nb\n```"), "```\na\nb\n```");
        assert_eq!(LineBreakMode.apply("Title\n====="), "Title\n=====");
        assert_eq!(LineBreakMode.apply("> a\n> b"), "> a\n> b");
    }

    #[test]
    fn test_line_break_mode_skips_indented_code() {
        let code = "Intro\n\n    let a = 1;\n    let b = 2;\n\nAfter\nmore";
        assert_eq!(LineBreakMode.apply(code), "Intro\n\n    let a = 1;\n    let b = 2;\n\nAfter  \nmore");
        assert_eq!(LineBreakMode.apply("\tx = 1\n\ty = 2"), "\tx = 1\n\ty = 2");

        // An indented line right after paragraph text is a lazy continuation
        assert_eq!(LineBreakMode.apply("one\n    two"), "one  \n    two");
    }

    #[test]
    fn test_link_policy() {
        let policy = LinkPolicy::default();
        assert!(policy.is_allowed("https://example.com"));
        assert!(policy.is_allowed("MAILTO:someone@example.com"));
        assert!(policy.is_allowed("/relative/path"));
        assert!(policy.is_allowed("#fragment"));
        assert!(policy.is_allowed("page?next=a:b"));
        assert!(!policy.is_allowed("javascript:alert(1)"));
        assert!(!policy.is_allowed("action:add-to-cart"));

        let policy = LinkPolicy::with_extra(&["Action".to_string()]);
        assert!(policy.is_allowed("action:add-to-cart"));
    }

    #[test]
    fn test_link_sanitizer() {
        let sanitizer = LinkSanitizer::new(LinkPolicy::default());
        assert_eq!(
            sanitizer.apply(r#"<a href="javascript:alert(1)">x</a> <a href="https://ok">y</a>"#),
            r#"<a href="">x</a> <a href="https://ok">y</a>"#
        );
    }
}
