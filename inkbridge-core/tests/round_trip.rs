//! Round-trip stability of editor HTML through stored Markdown

use inkbridge_core::config::DEFAULT_AD_IMAGE_URL;
use inkbridge_core::{EditorConfig, RoundTripConverter};

/// HTML shapes the rich-text widget produces
const EDITOR_SAMPLES: &[&str] = &[
    "<p>Plain paragraph</p>",
    "<p>Some <strong>bold</strong> and <em>italic</em> text</p>",
    "<h1>Title</h1><p>Body</p>",
    "<h2>Section</h2><p>First line<br>second line</p>",
    "<p>Read <a href=\"https://example.com/docs\">the docs</a> first</p>",
    "<ul><li>one</li><li>two</li><li>three</li></ul>",
    "<ol><li>first</li><li>second</li></ol>",
    "<p>Intro</p><ul><li>a</li><li>b</li></ul>",
    "<blockquote><p>Quoted words</p></blockquote>",
    "<p><img alt=\"cat\" src=\"https://images.example/cat.png\"></p>",
    "<pre><code class=\"language-rust\">fn main() {}\n</code></pre>",
    "<p>Price: 5 * 3 = 15_000 [approx]</p>",
    "<p>Line one</p><p>Line two</p><p>Line three</p>",
    "<p><br></p>",
    "<p>#</p>",
    "<p>C#</p><p>##</p>",
    "<p>+</p>",
    "<p>1.</p>",
    "<ol start=\"18446744073709551615\"><li>last</li></ol>",
];

fn assert_stable(converter: &RoundTripConverter, html: &str) {
    let markdown = converter.to_markdown(html);
    let again = converter.to_markdown(&converter.to_html(&markdown).unwrap());
    assert_eq!(again, markdown, "round trip drifted for {:?}", html);
}

#[test]
fn editor_html_round_trips_without_drift() {
    let converter = RoundTripConverter::new();
    for html in EDITOR_SAMPLES {
        assert_stable(&converter, html);
    }
}

#[test]
fn check_round_trip_accepts_editor_html() {
    let converter = RoundTripConverter::new();
    for html in EDITOR_SAMPLES {
        assert!(
            converter.check_round_trip(html).is_ok(),
            "unexpected anomaly for {:?}",
            html
        );
    }
}

#[test]
fn repeated_cycles_settle_after_first_save() {
    let converter = RoundTripConverter::new();
    let mut markdown = converter.to_markdown(
        "<h1>Notes</h1><p>Alpha<br>Beta</p><ul><li>x</li><li>y</li></ul><p>End</p>",
    );
    let first = markdown.clone();

    for _ in 0..5 {
        markdown = converter.to_markdown(&converter.to_html(&markdown).unwrap());
    }
    assert_eq!(markdown, first);
}

#[test]
fn indented_code_gets_no_hard_breaks() {
    let converter = RoundTripConverter::new();
    let html = converter
        .to_html("Intro\n\n    let a = 1;\n    let b = 2;")
        .unwrap();
    assert!(html.contains("let a = 1;\nlet b = 2;"), "unexpected html {:?}", html);

    let markdown = converter.to_markdown(&html);
    assert!(
        markdown.lines().all(|line| !line.ends_with(' ')),
        "trailing spaces in {:?}",
        markdown
    );
    assert!(markdown.contains("let a = 1;\nlet b = 2;"));
}

#[test]
fn ad_image_contracts_only_when_placeholder_enabled() {
    let html = format!(
        "<p><img alt=\"Ad Placeholder\" src=\"{}\"></p>",
        DEFAULT_AD_IMAGE_URL
    );

    let converter = RoundTripConverter::new();
    assert_eq!(converter.to_markdown(&html), "<p class=\"inline ad\"></p>");

    let mut config = EditorConfig::default();
    config.ad_placeholder.enabled = false;
    let converter = RoundTripConverter::from_config(&config);
    assert!(converter.to_markdown(&html).starts_with("![Ad Placeholder]("));
}

#[test]
fn action_links_need_an_allowed_protocol() {
    let html = "<p><a href=\"action:open-cart\">Cart</a></p>";

    let strict = RoundTripConverter::new();
    assert_eq!(strict.to_markdown(html), "Cart");

    let config = EditorConfig {
        allowed_protocols: vec!["action".to_string()],
        ..Default::default()
    };
    let permissive = RoundTripConverter::from_config(&config);
    let markdown = permissive.to_markdown(html);
    assert_eq!(markdown, "[Cart](action:open-cart)");
    assert_stable(&permissive, html);
}
