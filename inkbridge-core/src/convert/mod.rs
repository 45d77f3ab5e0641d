//! Round-trip conversion between stored Markdown and editor HTML
//!
//! [`RoundTripConverter`] wraps the Markdown→HTML engine (markdown-rs) and the
//! HTML→Markdown serializer, and runs the markup extension set around them.
//! Both directions are pure functions of their input and the extension set.

pub mod extensions;
pub mod html;
pub mod to_markdown;

use markdown::{CompileOptions, Options, ParseOptions};

use crate::config::EditorConfig;
use crate::error::{InkbridgeError, Result};
use extensions::{
    AdPlaceholder, AdPlaceholderContraction, AdPlaceholderExpansion, BlankLineInterception,
    LineBreakMode, LinkPolicy, LinkSanitizer, ListSpacingFix, MarkupExtension, Stage,
};

pub use extensions::BLANK_DOCUMENT_HTML;

/// Markdown/HTML converter with the editor's markup extensions
pub struct RoundTripConverter {
    extensions: Vec<Box<dyn MarkupExtension>>,
    links: LinkPolicy,
}

impl RoundTripConverter {
    /// Create a converter with the default extension set
    pub fn new() -> Self {
        Self::from_config(&EditorConfig::default())
    }

    /// Create a converter from editor configuration
    pub fn from_config(config: &EditorConfig) -> Self {
        let links = LinkPolicy::with_extra(&config.allowed_protocols);

        let mut extensions: Vec<Box<dyn MarkupExtension>> = vec![Box::new(ListSpacingFix)];
        if config.ad_placeholder.enabled {
            let placeholder = AdPlaceholder::new(
                config.ad_placeholder.image_url.clone(),
                config.ad_placeholder.alt.clone(),
            );
            extensions.push(Box::new(AdPlaceholderExpansion::new(placeholder.clone())));
            extensions.push(Box::new(AdPlaceholderContraction::new(&placeholder)));
        }
        extensions.push(Box::new(BlankLineInterception::new(
            config.blank_placeholder_html.clone(),
        )));
        extensions.push(Box::new(LineBreakMode));
        extensions.push(Box::new(LinkSanitizer::new(links.clone())));

        Self { extensions, links }
    }

    /// Markdown engine options; built per call as they hold non-`Send` hooks
    fn options() -> Options {
        // Protocol filtering is done by LinkSanitizer so custom schemes survive
        Options {
            parse: ParseOptions::gfm(),
            compile: CompileOptions {
                allow_dangerous_html: true,
                allow_dangerous_protocol: true,
                ..CompileOptions::gfm()
            },
        }
    }

    /// Names of the registered extensions in application order
    pub fn extension_names(&self) -> Vec<&str> {
        self.extensions.iter().map(|ext| ext.name()).collect()
    }

    fn run_stage(&self, stage: Stage, text: String) -> String {
        self.extensions
            .iter()
            .filter(|ext| ext.stage() == stage)
            .fold(text, |text, ext| ext.apply(&text).into_owned())
    }

    /// Convert stored Markdown into editor HTML
    pub fn to_html(&self, markdown: &str) -> Result<String> {
        let source = self.run_stage(Stage::MarkdownSource, markdown.to_string());
        let html = markdown::to_html_with_options(&source, &Self::options())
            .map_err(|e| InkbridgeError::conversion_anomaly(format!("Markdown parse failed: {}", e)))?;
        Ok(self.run_stage(Stage::HtmlOutput, html))
    }

    /// Convert editor HTML into Markdown for storage
    pub fn to_markdown(&self, html: &str) -> String {
        let source = self.run_stage(Stage::HtmlSource, html.to_string());
        let markdown = to_markdown::html_to_markdown(&source, &self.links);
        self.run_stage(Stage::MarkdownOutput, markdown)
    }

    /// Check that Markdown survives another HTML round trip unchanged.
    ///
    /// Returns a `ConversionAnomaly` naming the first line that drifted.
    pub fn verify_markdown(&self, markdown: &str) -> Result<()> {
        let reconverted = self.to_markdown(&self.to_html(markdown)?);
        if reconverted == markdown {
            return Ok(());
        }

        let (line, expected, actual) = markdown
            .lines()
            .zip(reconverted.lines())
            .enumerate()
            .find(|(_, (a, b))| a != b)
            .map(|(i, (a, b))| (i + 1, a.to_string(), b.to_string()))
            .unwrap_or_else(|| {
                let line = markdown.lines().count().min(reconverted.lines().count()) + 1;
                (line, String::from("<end>"), String::from("<end>"))
            });

        Err(InkbridgeError::conversion_anomaly(format!(
            "round trip changed line {}: {:?} became {:?}",
            line, expected, actual
        )))
    }

    /// Convert editor HTML and verify the result round-trips
    pub fn check_round_trip(&self, html: &str) -> Result<String> {
        let markdown = self.to_markdown(html);
        self.verify_markdown(&markdown)?;
        Ok(markdown)
    }
}

impl Default for RoundTripConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_AD_IMAGE_URL;

    #[test]
    fn test_extension_order() {
        let converter = RoundTripConverter::new();
        assert_eq!(
            converter.extension_names(),
            vec![
                "list-spacing",
                "ad-placeholder-expansion",
                "ad-placeholder-contraction",
                "blank-line-interception",
                "line-break-mode",
                "link-sanitizer",
            ]
        );
    }

    #[test]
    fn test_to_html_basics() {
        let converter = RoundTripConverter::new();
        let html = converter.to_html("# Hello\n\nThis is **bold** text.").unwrap();
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<strong>bold</strong>"));
    }

    #[test]
    fn test_single_newline_is_hard_break() {
        let converter = RoundTripConverter::new();
        let html = converter.to_html("first\nsecond").unwrap();
        assert!(html.contains("first<br />"), "{}", html);
    }

    #[test]
    fn test_list_follows_paragraph_without_gap() {
        let converter = RoundTripConverter::new();
        let html = converter.to_html("Intro\n\n- a\n- b").unwrap();
        assert!(html.contains("</p><p><ul>"), "{}", html);
    }

    #[test]
    fn test_ad_sentinel_round_trip() {
        let converter = RoundTripConverter::new();
        let markdown = "Before\n\n<p class=\"inline ad\"></p>\n\nAfter";

        let html = converter.to_html(markdown).unwrap();
        assert!(html.contains(DEFAULT_AD_IMAGE_URL), "{}", html);
        assert!(!html.contains("inline ad"));

        assert_eq!(converter.to_markdown(&html), markdown);
    }

    #[test]
    fn test_ad_placeholder_disabled() {
        let mut config = EditorConfig::default();
        config.ad_placeholder.enabled = false;
        let converter = RoundTripConverter::from_config(&config);

        let html = converter.to_html("<p class=\"inline ad\"></p>").unwrap();
        assert!(html.contains("inline ad"));
    }

    #[test]
    fn test_blank_document_becomes_placeholder() {
        let converter = RoundTripConverter::new();
        let markdown = converter.to_markdown(BLANK_DOCUMENT_HTML);
        assert!(!markdown.is_empty());
        assert_eq!(markdown, "\u{a0}  \n\u{a0}");
    }

    #[test]
    fn test_custom_protocol_links() {
        let converter = RoundTripConverter::new();
        let html = converter.to_html("[buy](action:add-to-cart)").unwrap();
        assert!(html.contains(r#"href="""#), "{}", html);

        let config = EditorConfig {
            allowed_protocols: vec!["action".to_string()],
            ..Default::default()
        };
        let converter = RoundTripConverter::from_config(&config);
        let html = converter.to_html("[buy](action:add-to-cart)").unwrap();
        assert!(html.contains(r#"href="action:add-to-cart""#), "{}", html);
        assert_eq!(converter.to_markdown(&html), "[buy](action:add-to-cart)");
    }

    #[test]
    fn test_verify_markdown_reports_drift() {
        let converter = RoundTripConverter::new();
        assert!(converter.verify_markdown("# Title\n\nBody").is_ok());

        let err = converter.verify_markdown("Title\n=====").unwrap_err();
        assert!(matches!(err, InkbridgeError::ConversionAnomaly(_)));
    }
}
