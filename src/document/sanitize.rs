//! Gatekeeper for free-form strings that end up in the serialized document.
//!
//! Everything is checked against a normalized copy (comments removed, CSS
//! escapes decoded, control characters and whitespace dropped, lowercased)
//! while the original text is what gets emitted. Skin fragments are written
//! raw, so their XML character references are decoded before any check.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_PROTOCOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:java|vb|live)script:").expect("valid regex"));
static EXPRESSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"expression\(").expect("valid regex"));
static IMPORT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@import").expect("valid regex"));
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"url\(([^)]*)\)?").expect("valid regex"));
static FRAGMENT_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[a-z_][\w.:-]*$").expect("valid regex"));
static TRANSFORM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(?:(?:matrix|translate|scale|rotate|skewX|skewY)\s*\(\s*[-+0-9.eE,\s]*\)\s*,?\s*)*$",
    )
    .expect("valid regex")
});
static CSS_COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*.*?(?:\*/|$)").expect("valid regex"));
static CSS_ESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\([0-9a-fA-F]{1,6})\s?|\\(.)").expect("valid regex"));
static UNSAFE_MARKUP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<\s*(?:script|iframe|foreignobject|object|embed)|<!(?:doctype|entity)|\son[a-z]+\s*=")
        .expect("valid regex")
});
static XML_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&#(?:[xX]([0-9a-fA-F]+)|([0-9]+));?|&([a-zA-Z]+);").expect("valid regex")
});
static URL_ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:href|src)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).expect("valid regex")
});

/// Normal form used for all checks.
fn normalize(input: &str) -> String {
    let without_comments = CSS_COMMENT_RE.replace_all(input, "");
    let decoded = CSS_ESCAPE_RE.replace_all(&without_comments, |caps: &regex::Captures<'_>| {
        if let Some(hex) = caps.get(1) {
            u32::from_str_radix(hex.as_str(), 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        } else {
            caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default()
        }
    });
    decoded
        .chars()
        .filter(|ch| !ch.is_whitespace() && !ch.is_control())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Decodes numeric and predefined XML character references the way an XML
/// parser would, in a single pass.
fn decode_references(input: &str) -> Cow<'_, str> {
    XML_REF_RE.replace_all(input, |caps: &regex::Captures<'_>| {
        let code = if let Some(hex) = caps.get(1) {
            u32::from_str_radix(hex.as_str(), 16).ok()
        } else if let Some(dec) = caps.get(2) {
            dec.as_str().parse::<u32>().ok()
        } else {
            let named = match caps.get(3).map(|m| m.as_str()) {
                Some("amp") => "&",
                Some("lt") => "<",
                Some("gt") => ">",
                Some("quot") => "\"",
                Some("apos") => "'",
                _ => &caps[0],
            };
            return named.to_string();
        };
        code.and_then(char::from_u32)
            .unwrap_or(char::REPLACEMENT_CHARACTER)
            .to_string()
    })
}

fn is_unsafe_value(normalized: &str) -> bool {
    if SCRIPT_PROTOCOL_RE.is_match(normalized)
        || EXPRESSION_RE.is_match(normalized)
        || IMPORT_RE.is_match(normalized)
    {
        return true;
    }
    URL_RE.captures_iter(normalized).any(|caps| {
        let closed = caps.get(0).is_some_and(|m| m.as_str().ends_with(')'));
        let target = caps
            .get(1)
            .map(|m| m.as_str().trim_matches(|c| c == '"' || c == '\''))
            .unwrap_or_default();
        !closed || !FRAGMENT_REF_RE.is_match(target)
    })
}

/// Filters a `style` attribute declaration by declaration. Returns the
/// input untouched when nothing was dropped, `None` when nothing survives.
pub fn sanitize_style(style: &str) -> Option<String> {
    let mut kept: Vec<&str> = Vec::new();
    let mut dropped = false;
    for decl in style.split(';') {
        if decl.trim().is_empty() {
            continue;
        }
        let valid = decl.split_once(':').is_some_and(|(prop, _)| {
            !prop.trim().is_empty()
                && prop
                    .trim()
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
        if !valid || is_unsafe_value(&normalize(decl)) {
            tracing::debug!(declaration = decl, "dropping unsafe style declaration");
            dropped = true;
            continue;
        }
        kept.push(decl);
    }
    if kept.is_empty() {
        return None;
    }
    if !dropped {
        return Some(style.to_string());
    }
    Some(kept.iter().map(|d| d.trim()).collect::<Vec<_>>().join(";"))
}

/// Accepts only plain SVG transform lists.
pub fn sanitize_transform(transform: &str) -> Option<String> {
    if transform.contains(['"', '\'', '`']) {
        tracing::debug!(transform, "dropping quoted transform");
        return None;
    }
    if TRANSFORM_RE.is_match(transform) {
        Some(transform.to_string())
    } else {
        tracing::debug!(transform, "dropping malformed transform");
        None
    }
}

/// A single paint value: a color, `none`, or a same-document reference.
pub fn sanitize_paint(paint: &str) -> Option<String> {
    let normalized = normalize(paint);
    if normalized.contains([';', '<', '>', '{', '}']) || is_unsafe_value(&normalized) {
        tracing::debug!(paint, "dropping unsafe paint");
        return None;
    }
    Some(paint.to_string())
}

/// Link targets; script and data protocols are refused.
pub fn sanitize_href(href: &str) -> Option<String> {
    let normalized = normalize(href);
    if SCRIPT_PROTOCOL_RE.is_match(&normalized) || normalized.starts_with("data:") {
        tracing::debug!(href, "dropping unsafe link");
        return None;
    }
    Some(href.to_string())
}

/// Raw `<defs>` markup from skin packs. Link attributes may only point at
/// fragments in the same document.
pub fn sanitize_fragment(fragment: &str) -> Option<String> {
    let decoded = decode_references(fragment);
    let lowered = decoded.to_ascii_lowercase();
    let external_link = URL_ATTR_RE.captures_iter(fragment).any(|caps| {
        let value = caps
            .get(1)
            .or_else(|| caps.get(2))
            .or_else(|| caps.get(3))
            .map_or("", |m| m.as_str());
        !FRAGMENT_REF_RE.is_match(&normalize(&decode_references(value)))
    });
    if external_link || UNSAFE_MARKUP_RE.is_match(&lowered) || is_unsafe_value(&normalize(&decoded)) {
        tracing::warn!("dropping unsafe skin definitions fragment");
        return None;
    }
    Some(fragment.to_string())
}
