//! Typed note-body tree and the pure rewrite helpers.
//!
//! The body format is owned by the editing surface; the engine only cares
//! about two shapes inside it: nodes that carry children, and image-like
//! leaves that carry a `url` field. [`BodyNode`] models exactly that closed
//! set while round-tripping every other field untouched, so traversal is
//! exhaustive instead of duck-typed.
//!
//! A `url` takes one of three local forms:
//! - inline binary: `data:<mime>;base64,<payload>` (input-only, never stored)
//! - hash-reference: `tabula-blob:<sha256-hex>` (the durable storage form)
//! - display handle: `tabula-display://<token>` (ephemeral render form)
//!
//! Plain web URLs are none of these and pass through every rewrite.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

use crate::defaults::{DISPLAY_SCHEME, HASH_REF_SCHEME};

/// A note body is a sequence of block nodes.
pub type NoteBody = Vec<BodyNode>;

/// One node of the body tree. Unknown fields are preserved verbatim in
/// `rest` so the body stays opaque to everything but the rewrites.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BodyNode {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    /// Present on image-like leaves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BodyNode>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, Value>,
}

impl BodyNode {
    /// A plain text node (test and fixture convenience).
    pub fn text(text: impl Into<String>) -> Self {
        let mut rest = serde_json::Map::new();
        rest.insert("text".to_string(), Value::String(text.into()));
        Self {
            node_type: Some("text".to_string()),
            ..Default::default()
        }
        .with_rest(rest)
    }

    /// An image leaf pointing at `url`.
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            node_type: Some("image".to_string()),
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// A container node with children.
    pub fn element(node_type: impl Into<String>, children: Vec<BodyNode>) -> Self {
        Self {
            node_type: Some(node_type.into()),
            children,
            ..Default::default()
        }
    }

    fn with_rest(mut self, rest: serde_json::Map<String, Value>) -> Self {
        self.rest = rest;
        self
    }
}

/// Build the durable hash-reference URL for a blob hash.
pub fn make_reference(hash: &str) -> String {
    format!("{HASH_REF_SCHEME}{hash}")
}

/// Extract the blob hash from a hash-reference URL.
pub fn hash_from_reference(url: &str) -> Option<&str> {
    url.strip_prefix(HASH_REF_SCHEME)
}

/// Whether a URL is a display-handle URI produced by this process.
pub fn is_display_url(url: &str) -> bool {
    url.starts_with(DISPLAY_SCHEME)
}

/// Parse an inline `data:` URI into its MIME type and decoded payload.
/// Returns `None` for anything that is not a base64 data URI.
pub fn parse_data_uri(url: &str) -> Option<(String, Vec<u8>)> {
    let remainder = url.strip_prefix("data:")?;
    let (mime, payload) = remainder.split_once(";base64,")?;
    let bytes = BASE64.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

/// Whether a URL is one of the three local image forms. Plain web URLs are
/// not local content and never participate in rewrites or upload stripping.
pub fn is_local_image_url(url: &str) -> bool {
    url.starts_with("data:") || url.starts_with(HASH_REF_SCHEME) || is_display_url(url)
}

/// Collect every `url` value in the tree, depth-first.
pub fn collect_urls(nodes: &[BodyNode]) -> Vec<String> {
    let mut urls = Vec::new();
    fn walk(nodes: &[BodyNode], urls: &mut Vec<String>) {
        for node in nodes {
            if let Some(url) = &node.url {
                urls.push(url.clone());
            }
            walk(&node.children, urls);
        }
    }
    walk(nodes, &mut urls);
    urls
}

/// Rewrite every `url` in the tree through `f`; `None` leaves the value in
/// place. The traversal is the single substitution primitive behind all
/// three body representations.
pub fn map_urls(nodes: Vec<BodyNode>, f: &impl Fn(&str) -> Option<String>) -> Vec<BodyNode> {
    nodes
        .into_iter()
        .map(|mut node| {
            if let Some(url) = node.url.take() {
                node.url = Some(f(&url).unwrap_or(url));
            }
            node.children = map_urls(std::mem::take(&mut node.children), f);
            node
        })
        .collect()
}

/// All blob hashes referenced by the body. Pure read, used for orphan
/// reachability.
pub fn extract_references(nodes: &[BodyNode]) -> HashSet<String> {
    collect_urls(nodes)
        .iter()
        .filter_map(|url| hash_from_reference(url))
        .map(str::to_string)
        .collect()
}

/// Remove every node carrying a local image URL, recursively. Run on each
/// body before upload: images are local-only and never leave the device.
pub fn strip_images(nodes: Vec<BodyNode>) -> Vec<BodyNode> {
    nodes
        .into_iter()
        .filter_map(|mut node| {
            if node.url.as_deref().is_some_and(is_local_image_url) {
                return None;
            }
            node.children = strip_images(std::mem::take(&mut node.children));
            Some(node)
        })
        .collect()
}
