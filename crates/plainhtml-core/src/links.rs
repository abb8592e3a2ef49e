//! Link/markup applier.
//!
//! Walks the compiled dictionary in declaration order against one
//! paragraph. Each rule repeatedly searches the working string, skipping
//! matches that sit in link context, and rewrites in place so the resume
//! position lands just past the inserted replacement.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dict::{LinkDictionary, OnceMemo};
use crate::tags::TagStyle;

static A_TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</?a\b").unwrap());
static A_OPEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<a\b").unwrap());
static A_CLOSE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)</a\s*>").unwrap());

/// A match must not be rewritten when it is already part of an anchor, or
/// sits inside an HTML tag's angle-bracket span.
pub(crate) fn in_link_context(before: &str, matched: &str) -> bool {
    if A_TAG_RE.is_match(matched) {
        return true;
    }
    let opens = A_OPEN_RE.find_iter(before).count();
    let closes = A_CLOSE_RE.find_iter(before).count();
    if opens > closes {
        return true;
    }
    // A dangling `<` after the last `>` means we are inside a tag.
    match (before.rfind('<'), before.rfind('>')) {
        (Some(lt), Some(gt)) => lt > gt,
        (Some(_), None) => true,
        _ => false,
    }
}

/// Apply every live rule to one paragraph, in declaration order.
pub(crate) fn apply_rules(
    dict: &LinkDictionary,
    memo: &mut OnceMemo,
    ts: TagStyle,
    text: &str,
) -> String {
    let mut current = text.to_string();
    for (idx, rule) in dict.rules().iter().enumerate() {
        if memo.exhausted(idx, rule) {
            continue;
        }
        let mut search = 0usize;
        let mut fired = false;
        while search <= current.len() {
            let (start, end, replacement) = {
                let caps = match rule.regex().captures_at(&current, search) {
                    Some(caps) => caps,
                    None => break,
                };
                let whole = match caps.get(0) {
                    Some(m) => m,
                    None => break,
                };
                (whole.start(), whole.end(), rule.render(&caps, ts))
            };
            if end == start {
                // Zero-width match; step forward to guarantee progress.
                search = end + 1;
                continue;
            }
            if in_link_context(&current[..start], &current[start..end]) {
                search = end;
                continue;
            }
            current.replace_range(start..end, &replacement);
            search = start + replacement.len();
            fired = true;
            if rule.once() || rule.sect_once() {
                break;
            }
        }
        if fired {
            memo.record(idx, rule);
            log::debug!("rule {idx} rewrote a span");
        }
    }
    current
}
