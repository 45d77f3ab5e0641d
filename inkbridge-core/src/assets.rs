//! Caret-relative image insertion

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::convert::html::top_level_blocks;
use crate::error::Result;
use crate::host::AssetRecord;

/// An image asset ready for insertion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub file_name: String,
    pub url: String,
}

impl Asset {
    pub fn new<N: Into<String>, U: Into<String>>(file_name: N, url: U) -> Self {
        Self {
            file_name: file_name.into(),
            url: url.into(),
        }
    }

    /// Build from a picker record; `None` when the record has no file for the locale
    pub fn from_record(record: &AssetRecord, locale: &str) -> Option<Self> {
        let file = record.file(locale)?;
        Some(Self::new(file.file_name.clone(), normalize_url(&file.url)))
    }

    /// File name without its extension
    pub fn alt_text(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(&self.file_name)
    }

    /// The paragraph block inserted for this asset
    pub fn to_block_html(&self) -> String {
        format!(
            r#"<p><img alt="{}" src="{}"></p>"#,
            html_escape::encode_double_quoted_attribute(self.alt_text()),
            html_escape::encode_double_quoted_attribute(&self.url)
        )
    }
}

/// Host asset URLs are protocol-relative
fn normalize_url(url: &str) -> String {
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}

/// Insert one image block per asset before the block holding the caret.
///
/// `caret` is a plain-text character offset. Top-level element blocks are
/// walked in order accumulating their text length; the first block that
/// takes the running total past the caret is the insertion point. Assets are
/// appended when no block does. The document is re-serialized block by block,
/// so the result is the normalized form of `html` plus the new images.
pub fn insert_assets(html: &str, caret: usize, assets: &[Asset]) -> Result<String> {
    if assets.is_empty() {
        return Ok(html.to_string());
    }

    let blocks = top_level_blocks(html)?;
    let mut total = 0;
    let position = blocks
        .iter()
        .position(|block| {
            if !block.is_element {
                return false;
            }
            total += block.text_len;
            total > caret
        })
        .unwrap_or(blocks.len());

    let inserted: String = assets.iter().map(Asset::to_block_html).collect();

    let mut result = String::with_capacity(html.len() + inserted.len());
    for block in &blocks[..position] {
        result.push_str(&block.html);
    }
    result.push_str(&inserted);
    for block in &blocks[position..] {
        result.push_str(&block.html);
    }
    Ok(result)
}
