//! Link dictionary compiler.
//!
//! A dictionary is a sequence of entries `KEY -FLAGS-> REPLACEMENT`, one
//! per line. Keys come in three forms: `/regex/` (or `|regex|`), a quoted
//! `"literal"`, or a bare glob (`?` and `*` wildcards). Each entry compiles
//! to a searchable regex plus a replacement form; declaration order is
//! preserved and is significant to the applier.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex, RegexBuilder};

use crate::error::{ConvertError, Result};
use crate::tags::TagStyle;

/// The built-in standard dictionary, used when no site dictionary file is
/// configured.
pub const STANDARD_DICT: &str = r#"# Standard link dictionary.
#
# Entry format is
#   PATTERN -FLAGS-> REPLACEMENT
# with flags drawn from i (ignore case), h (replacement is HTML),
# o (once per document) and s (once per paragraph).

# Web and FTP locations.
|\bhttps?://[\w/.:+~%#?=&;,-]+[\w/]| -h-> <A HREF="$&">$&</A>
|\bftp://[\w/.:+~%#?=&;,-]+[\w/]| -h-> <A HREF="$&">$&</A>

# Bare mail addresses become mailto links.
|\b[\w.+-]+@[\w-]+(\.[\w-]+)+\b| -h-> <A HREF="mailto:$&">$&</A>

# *starred* words render emphasised.
|\B\*(\w[\w .:'-]*\w|\w)\*\B| -h-> <EM>$1</EM>

# _underscored_ words render underlined.
|\B_(\w[\w .:'-]*\w|\w)_\B| -h-> <U>$1</U>
"#;

/// How a matched span is rewritten.
#[derive(Clone, Debug)]
pub(crate) enum Replacement {
    /// The template is a URL; the match is wrapped in an anchor.
    AnchorWrap(String),
    /// The template is raw HTML, inserted after `$&`/`$N` substitution.
    Html(String),
}

#[derive(Clone, Debug)]
pub struct LinkRule {
    key: String,
    re: Regex,
    replacement: Replacement,
    once: bool,
    sect_once: bool,
}

impl LinkRule {
    pub(crate) fn regex(&self) -> &Regex {
        &self.re
    }

    pub(crate) fn once(&self) -> bool {
        self.once
    }

    pub(crate) fn sect_once(&self) -> bool {
        self.sect_once
    }

    pub(crate) fn render(&self, caps: &Captures<'_>, ts: TagStyle) -> String {
        match &self.replacement {
            Replacement::Html(template) => expand_template(template, caps),
            Replacement::AnchorWrap(template) => {
                let url = expand_template(template, caps);
                let text = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
                format!(
                    "<{a} {href}=\"{url}\">{text}</{a}>",
                    a = ts.name("A"),
                    href = ts.name("HREF"),
                )
            }
        }
    }
}

/// An ordered, immutable set of compiled rules. A compiled dictionary may
/// be shared across converter instances; per-instance firing state lives in
/// [`OnceMemo`].
#[derive(Clone, Debug, Default)]
pub struct LinkDictionary {
    rules: Vec<LinkRule>,
}

// The arrow is one or more dashes, optional flags, then `->`; a bare
// `-->`/`---->` carries no flags.
static ENTRY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(.+?)\s+-+([iehos]*)-*>\s*(.*)$").unwrap());
static ARROW_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-+[iehos]*-*>").unwrap());

impl LinkDictionary {
    /// The built-in standard dictionary.
    pub fn standard() -> Self {
        match Self::parse("builtin", STANDARD_DICT) {
            Ok(dict) => dict,
            Err(err) => {
                log::error!("builtin dictionary failed to compile: {err}");
                Self::default()
            }
        }
    }

    /// Parse and compile dictionary text. `name` labels error context.
    pub fn parse(name: &str, text: &str) -> Result<Self> {
        let mut dict = Self::default();
        dict.extend_from(name, text)?;
        Ok(dict)
    }

    /// Append the entries of another dictionary file, preserving order.
    pub fn extend_from(&mut self, name: &str, text: &str) -> Result<()> {
        let mut seen: HashSet<String> = self.rules.iter().map(|r| r.key.clone()).collect();
        for raw_line in text.lines() {
            let line = raw_line.trim_end();
            if line.trim().is_empty() || line.trim_start().starts_with('#') {
                continue;
            }
            if ends_with_unescaped_colon(line) {
                continue;
            }
            if ARROW_RE.find_iter(line).count() >= 2 {
                return Err(ConvertError::DictionaryParse {
                    file: name.to_string(),
                    reason: "entry contains two '->' arrows".to_string(),
                    context: line.to_string(),
                });
            }
            let caps = match ENTRY_RE.captures(line) {
                Some(caps) => caps,
                None => {
                    log::debug!("ignoring malformed dictionary line: {line}");
                    continue;
                }
            };
            let key = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let flags = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let template = caps.get(3).map(|m| m.as_str()).unwrap_or_default();

            if flags.contains('e') {
                return Err(ConvertError::DictionaryParse {
                    file: name.to_string(),
                    reason: "the 'e' (evaluate) flag is not supported; \
                             use an 'h' replacement instead"
                        .to_string(),
                    context: line.to_string(),
                });
            }
            if !seen.insert(key.to_string()) {
                log::debug!("dropping duplicate dictionary key: {key}");
                continue;
            }

            let pattern = compile_key(key);
            let re = RegexBuilder::new(&pattern)
                .case_insensitive(flags.contains('i'))
                .build()
                .map_err(|err| ConvertError::DictionaryParse {
                    file: name.to_string(),
                    reason: format!("bad pattern: {err}"),
                    context: line.to_string(),
                })?;
            let replacement = if flags.contains('h') {
                Replacement::Html(template.to_string())
            } else {
                Replacement::AnchorWrap(template.to_string())
            };
            self.rules.push(LinkRule {
                key: key.to_string(),
                re,
                replacement,
                once: flags.contains('o'),
                sect_once: flags.contains('s'),
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub(crate) fn rules(&self) -> &[LinkRule] {
        &self.rules
    }

    /// Dump the compiled rule list, for `dict_debug`.
    pub(crate) fn trace_rules(&self) {
        for (idx, rule) in self.rules.iter().enumerate() {
            log::debug!(
                "rule {idx}: key={} regex={} once={} sect_once={}",
                rule.key,
                rule.re.as_str(),
                rule.once,
                rule.sect_once
            );
        }
    }
}

/// Per-instance firing state for `o` and `s` rules, indexed by rule
/// position. The section vector is cleared at every paragraph boundary.
#[derive(Clone, Debug, Default)]
pub(crate) struct OnceMemo {
    doc: Vec<bool>,
    sect: Vec<bool>,
}

impl OnceMemo {
    pub fn new(rule_count: usize) -> Self {
        Self {
            doc: vec![false; rule_count],
            sect: vec![false; rule_count],
        }
    }

    pub fn clear_section(&mut self) {
        self.sect.iter_mut().for_each(|bit| *bit = false);
    }

    pub fn exhausted(&self, idx: usize, rule: &LinkRule) -> bool {
        (rule.once() && self.doc.get(idx).copied().unwrap_or(false))
            || (rule.sect_once() && self.sect.get(idx).copied().unwrap_or(false))
    }

    pub fn record(&mut self, idx: usize, rule: &LinkRule) {
        if rule.once() {
            if let Some(bit) = self.doc.get_mut(idx) {
                *bit = true;
            }
        }
        if rule.sect_once() {
            if let Some(bit) = self.sect.get_mut(idx) {
                *bit = true;
            }
        }
    }
}

fn ends_with_unescaped_colon(line: &str) -> bool {
    if !line.ends_with(':') {
        return false;
    }
    let before = &line[..line.len() - 1];
    !before.ends_with('\\')
}

/// Translate a dictionary key into a regex pattern string.
fn compile_key(key: &str) -> String {
    if let Some(body) = delimited(key, '/').or_else(|| delimited(key, '|')) {
        return body.to_string();
    }
    if let Some(body) = delimited(key, '"') {
        return format!(r"\b{}\b", regex::escape(body));
    }
    // Bare glob: ? and * wildcard, everything else literal.
    let mut pattern = String::from(r"\b");
    for ch in key.chars() {
        match ch {
            '?' => pattern.push('.'),
            '*' => pattern.push_str(".*"),
            c if c.is_alphanumeric() || c == '_' => pattern.push(c),
            c => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern.push_str(r"\b");
    pattern
}

/// The closing delimiter is optional.
fn delimited(key: &str, delim: char) -> Option<&str> {
    let body = key.strip_prefix(delim)?;
    Some(body.strip_suffix(delim).unwrap_or(body))
}

/// Substitute `$&` (whole match), `$1`..`$9` and `$$` in a replacement
/// template.
fn expand_template(template: &str, caps: &Captures<'_>) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '$' {
            out.push(ch);
            continue;
        }
        match chars.peek() {
            Some('&') => {
                chars.next();
                out.push_str(caps.get(0).map(|m| m.as_str()).unwrap_or_default());
            }
            Some('$') => {
                chars.next();
                out.push('$');
            }
            Some(d) if d.is_ascii_digit() => {
                let idx = d.to_digit(10).unwrap_or(0) as usize;
                chars.next();
                out.push_str(caps.get(idx).map(|m| m.as_str()).unwrap_or_default());
            }
            _ => out.push('$'),
        }
    }
    out
}
