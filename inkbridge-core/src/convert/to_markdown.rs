//! HTML to Markdown serializer
//!
//! A turndown-style pass over the parsed HTML tree. It covers the subset of
//! HTML a rich-text widget produces: headings, paragraphs, emphasis, links,
//! images, line breaks, nested lists, blockquotes, code and GFM tables.
//! Unknown elements keep their content.

use super::extensions::LinkPolicy;
use super::html::{parse_fragment, Element, Node};

/// Largest start number CommonMark accepts for an ordered list
const MAX_LIST_START: u64 = 999_999_999;

/// Serialize an HTML fragment to Markdown
pub fn html_to_markdown(html: &str, links: &LinkPolicy) -> String {
    let mut nodes = parse_fragment(html);
    let mut prev_space = true;
    collapse_whitespace(&mut nodes, &mut prev_space);

    let writer = MarkdownWriter { links };
    writer.blocks(&nodes).join("\n\n")
}

/// Markdown for an image, shared with the ad placeholder contraction
pub fn image_markdown(alt: &str, src: &str, title: Option<&str>) -> String {
    format!(
        "![{}]({}{})",
        escape_text(alt, false),
        destination(src),
        title_suffix(title)
    )
}

struct MarkdownWriter<'a> {
    links: &'a LinkPolicy,
}

impl MarkdownWriter<'_> {
    /// Render a sequence of nodes as Markdown blocks
    fn blocks(&self, nodes: &[Node]) -> Vec<String> {
        let mut blocks = Vec::new();
        let mut inline_run: Vec<&Node> = Vec::new();

        for node in nodes {
            match node {
                Node::Element(element) if element.is_block() => {
                    self.flush_inline(&mut inline_run, &mut blocks);
                    blocks.extend(self.block(element));
                }
                _ => inline_run.push(node),
            }
        }
        self.flush_inline(&mut inline_run, &mut blocks);

        blocks
    }

    fn flush_inline(&self, run: &mut Vec<&Node>, blocks: &mut Vec<String>) {
        if run.is_empty() {
            return;
        }
        let text = normalize_paragraph(&self.inline_nodes(run.drain(..)));
        if !text.is_empty() {
            blocks.push(text);
        }
    }

    fn block(&self, element: &Element) -> Vec<String> {
        match element.name.as_str() {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = element.name[1..].parse::<usize>().unwrap_or(1);
                let text = self.inline(&element.children).replace("  \n", " ");
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if text.is_empty() {
                    Vec::new()
                } else {
                    vec![format!("{} {}", "#".repeat(level), text)]
                }
            }
            "ul" | "ol" => self.list(element).into_iter().collect(),
            "blockquote" => {
                let inner = self.blocks(&element.children).join("\n\n");
                if inner.is_empty() {
                    return Vec::new();
                }
                let quoted = inner
                    .lines()
                    .map(|line| {
                        if line.is_empty() {
                            ">".to_string()
                        } else {
                            format!("> {}", line)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                vec![quoted]
            }
            "pre" => vec![code_block(element)],
            "hr" => vec!["* * *".to_string()],
            "table" => self.table(element).into_iter().collect(),
            _ => self.blocks(&element.children),
        }
    }

    fn list(&self, list: &Element) -> Option<String> {
        let ordered = list.name == "ol";
        let mut number = list
            .attr("start")
            .and_then(|start| start.trim().parse::<u64>().ok())
            .map(|start| start.min(MAX_LIST_START))
            .unwrap_or(1);

        let mut items = Vec::new();
        for item in list.children.iter().filter_map(Node::as_element) {
            if item.name != "li" {
                continue;
            }

            let marker = if ordered {
                format!("{}. ", number)
            } else {
                "- ".to_string()
            };
            number = number.saturating_add(1);

            let content = self.blocks(&item.children).join("\n");
            let indent = " ".repeat(marker.len());
            let mut lines = content.lines();
            let mut rendered = format!("{}{}", marker, lines.next().unwrap_or("")).trim_end().to_string();
            for line in lines {
                rendered.push('\n');
                if !line.is_empty() {
                    rendered.push_str(&indent);
                    rendered.push_str(line);
                }
            }
            items.push(rendered);
        }

        if items.is_empty() {
            None
        } else {
            Some(items.join("\n"))
        }
    }

    fn table(&self, table: &Element) -> Option<String> {
        let mut rows: Vec<Vec<String>> = Vec::new();
        collect_rows(table, &mut |row| {
            let cells = row
                .children
                .iter()
                .filter_map(Node::as_element)
                .filter(|cell| cell.name == "td" || cell.name == "th")
                .map(|cell| {
                    let text = self.inline(&cell.children).replace("  \n", " ");
                    text.trim().replace('|', "\\|")
                })
                .collect::<Vec<_>>();
            if !cells.is_empty() {
                rows.push(cells);
            }
        });

        let columns = rows.iter().map(Vec::len).max()?;
        let format_row = |cells: &[String]| {
            let mut padded: Vec<&str> = cells.iter().map(String::as_str).collect();
            padded.resize(columns, "");
            format!("| {} |", padded.join(" | "))
        };

        let mut lines = vec![format_row(&rows[0])];
        lines.push(format!("|{}", " --- |".repeat(columns)));
        lines.extend(rows[1..].iter().map(|row| format_row(row)));
        Some(lines.join("\n"))
    }

    fn inline(&self, nodes: &[Node]) -> String {
        self.inline_nodes(nodes.iter())
    }

    fn inline_nodes<'n>(&self, nodes: impl Iterator<Item = &'n Node>) -> String {
        let mut out = String::new();
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(&escape_text(text, out.is_empty() || out.ends_with('\n'))),
                Node::Element(element) => out.push_str(&self.inline_element(element)),
            }
        }
        out
    }

    fn inline_element(&self, element: &Element) -> String {
        match element.name.as_str() {
            "strong" | "b" => wrap(&self.inline(&element.children), "**"),
            "em" | "i" => wrap(&self.inline(&element.children), "*"),
            "s" | "strike" | "del" => wrap(&self.inline(&element.children), "~~"),
            "code" => code_span(&element.text_content()),
            "br" => "  \n".to_string(),
            "a" => {
                let text = self.inline(&element.children);
                match element.attr("href").filter(|href| self.links.is_allowed(href)) {
                    Some(href) if !href.is_empty() => format!(
                        "[{}]({}{})",
                        text,
                        destination(href),
                        title_suffix(element.attr("title"))
                    ),
                    _ => text,
                }
            }
            "img" => match element.attr("src").filter(|src| self.links.is_allowed(src)) {
                Some(src) if !src.is_empty() => image_markdown(
                    element.attr("alt").unwrap_or(""),
                    src,
                    element.attr("title"),
                ),
                _ => String::new(),
            },
            "input" if element.attr("type") == Some("checkbox") => {
                if element.attr("checked").is_some() {
                    "[x] ".to_string()
                } else {
                    "[ ] ".to_string()
                }
            }
            "script" | "style" => String::new(),
            _ => self.inline(&element.children),
        }
    }
}

fn collect_rows<'a>(element: &'a Element, visit: &mut dyn FnMut(&'a Element)) {
    for child in element.children.iter().filter_map(Node::as_element) {
        match child.name.as_str() {
            "tr" => visit(child),
            "thead" | "tbody" | "tfoot" => collect_rows(child, visit),
            _ => {}
        }
    }
}

fn code_block(pre: &Element) -> String {
    let language = pre
        .children
        .iter()
        .filter_map(Node::as_element)
        .find(|child| child.name == "code")
        .and_then(|code| code.attr("class"))
        .and_then(|class| {
            class
                .split_whitespace()
                .find_map(|name| name.strip_prefix("language-"))
        })
        .unwrap_or("");

    let code = pre.text_content();
    let code = code.strip_suffix('\n').unwrap_or(&code);

    let mut fence = "```".to_string();
    while code.contains(fence.as_str()) {
        fence.push('`');
    }

    format!("{}{}\n{}\n{}", fence, language, code, fence)
}

fn code_span(code: &str) -> String {
    if code.is_empty() {
        return String::new();
    }
    let mut ticks = "`".to_string();
    while code.contains(ticks.as_str()) {
        ticks.push('`');
    }
    if ticks.len() > 1 || code.starts_with('`') || code.ends_with('`') {
        format!("{} {} {}", ticks, code, ticks)
    } else {
        format!("{}{}{}", ticks, code, ticks)
    }
}

/// Wrap inline content in a delimiter, keeping edge whitespace outside it
fn wrap(content: &str, delimiter: &str) -> String {
    let core = content.trim_matches(|c: char| c.is_ascii_whitespace());
    if core.is_empty() {
        return content.to_string();
    }
    let lead = &content[..content.len() - content.trim_start_matches(|c: char| c.is_ascii_whitespace()).len()];
    let trail = &content[content.trim_end_matches(|c: char| c.is_ascii_whitespace()).len()..];
    format!("{}{}{}{}{}", lead, delimiter, core, delimiter, trail)
}

fn destination(url: &str) -> String {
    if url.contains([' ', '(', ')', '<', '>']) {
        format!("<{}>", url.replace('<', "%3C").replace('>', "%3E"))
    } else {
        url.to_string()
    }
}

fn title_suffix(title: Option<&str>) -> String {
    match title {
        Some(title) if !title.is_empty() => format!(" \"{}\"", title.replace('"', "\\\"")),
        _ => String::new(),
    }
}

/// Tidy a rendered paragraph: trim it, drop whitespace-only lines and the
/// hard-break spaces in front of them
fn normalize_paragraph(text: &str) -> String {
    let mut lines: Vec<String> = text
        .split('\n')
        .map(|line| {
            if line.chars().all(|c| c.is_ascii_whitespace()) {
                String::new()
            } else {
                line.to_string()
            }
        })
        .collect();

    for i in 0..lines.len() {
        let next_is_blank = lines.get(i + 1).map_or(true, |next| next.is_empty());
        if next_is_blank {
            let trimmed = lines[i].trim_end_matches(|c: char| c.is_ascii_whitespace()).len();
            lines[i].truncate(trimmed);
        }
    }

    let mut joined = lines.join("\n");
    while joined.contains("\n\n\n") {
        joined = joined.replace("\n\n\n", "\n\n");
    }
    joined
        .trim_matches(|c: char| c.is_ascii_whitespace())
        .to_string()
}

/// Collapse runs of whitespace in text the way a browser renders them
fn collapse_whitespace(nodes: &mut [Node], prev_space: &mut bool) {
    for node in nodes.iter_mut() {
        match node {
            Node::Text(text) => {
                let mut collapsed = String::with_capacity(text.len());
                for c in text.chars() {
                    if c.is_ascii_whitespace() {
                        if !*prev_space {
                            collapsed.push(' ');
                            *prev_space = true;
                        }
                    } else {
                        collapsed.push(c);
                        *prev_space = false;
                    }
                }
                *text = collapsed;
            }
            Node::Element(element) => match element.name.as_str() {
                "pre" => *prev_space = true,
                "br" => *prev_space = true,
                "img" => *prev_space = false,
                // Task checkboxes render with a trailing space
                "input" => *prev_space = true,
                name => {
                    let block = super::html::is_block(name);
                    if block {
                        *prev_space = true;
                    }
                    collapse_whitespace(&mut element.children, prev_space);
                    if block {
                        *prev_space = true;
                    }
                }
            },
        }
    }
}

/// Backslash-escape Markdown metacharacters in text
fn escape_text(text: &str, at_line_start: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, c) in text.char_indices() {
        match c {
            '\\' | '*' | '_' | '`' | '[' | ']' | '~' | '<' => {
                out.push('\\');
                out.push(c);
            }
            '&' if looks_like_entity(&text[index..]) => out.push_str("\\&"),
            _ => out.push(c),
        }
    }

    if at_line_start {
        escape_line_start(&out)
    } else {
        out
    }
}

fn looks_like_entity(text: &str) -> bool {
    let body = &text[1..];
    let end = body.find(';');
    end.is_some_and(|end| {
        end > 0 && body[..end].chars().all(|c| c.is_ascii_alphanumeric() || c == '#')
    })
}

/// Escape markers that would start a block at the beginning of a line.
///
/// ATX, bullet and ordered markers only count when followed by a space or
/// the end of the line, so a lone `#`, `+` or `1.` is escaped too.
fn escape_line_start(text: &str) -> String {
    let ends_marker = |rest: &str| rest.is_empty() || rest.starts_with(' ');

    let hashes = text.chars().take_while(|&c| c == '#').count();
    if (1..=6).contains(&hashes) && ends_marker(&text[hashes..]) {
        return format!("\\{}", text);
    }

    if text.starts_with('>')
        || text.starts_with('-')
        || text.starts_with('=')
        || text.strip_prefix('+').is_some_and(ends_marker)
    {
        return format!("\\{}", text);
    }

    let digits = text.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &text[digits..];
        let delimited = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')'));
        if delimited.is_some_and(ends_marker) {
            return format!("{}\\{}", &text[..digits], rest);
        }
    }

    text.to_string()
}
