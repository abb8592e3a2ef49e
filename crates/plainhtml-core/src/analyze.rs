//! Paragraph analyzer.
//!
//! One paragraph (a maximal run of non-blank lines) goes through a fixed
//! sequence of passes: table detection, HTML escaping, mail handling,
//! preformat end, horizontal rules, custom headings, lists, preformat
//! start, underlined headings, paragraph starts, short-line breaks,
//! all-caps lines, and hyphenation joins. Each pass records what it did in
//! the per-line [`LineAction`] so later passes do not reinterpret a line.
//! Ambiguous input resolves by pass order: tables dominate lists, lists
//! dominate paragraph detection. The analyzer never fails.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::line::{Line, LineAction, Mode};
use crate::options::{Options, DEFAULT_PRE_END_MARKER, DEFAULT_PRE_START_MARKER};
use crate::tags::TagStyle;

pub(crate) fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// A tag the assembler still owes a close for. `P` carries an optional end
/// tag in HTML mode and is only closed when a block interrupts it, or
/// always under XHTML.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OpenTag {
    P,
    Ul,
    Ol,
    Pre,
}

#[derive(Clone, Debug)]
pub(crate) struct ListFrame {
    /// The literal prefix that opened the frame, numbers elided, so a
    /// later item with the same shape matches its frame.
    pub prefix: String,
    pub ordered: bool,
    /// Column just past the marker; lines indented less than this leave
    /// the frame.
    pub indent: usize,
    pub li_open: bool,
}

/// Key identifying a heading style: the underline character plus an
/// all-caps discriminator, or the index of a custom heading pattern.
/// Levels are assigned in first-encounter order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HeadingStyle {
    Underline { ch: char, caps: bool },
    Custom(usize),
}

/// All analyzer state that survives across paragraphs (and, for fragment
/// conversion with `close_open_tags = false`, across calls).
#[derive(Clone, Debug, Default)]
pub(crate) struct AnalyzerState {
    pub mode: Mode,
    pub list_stack: Vec<ListFrame>,
    pub open_tags: Vec<OpenTag>,
    pub heading_styles: Vec<HeadingStyle>,
    pub heading_counters: Vec<u32>,
    pub prev_action: LineAction,
    pub prev_indent: usize,
    pub mail_header_active: bool,
    pub mail_count: u32,
}

impl AnalyzerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Close one list frame, first closing a paragraph still open inside
    /// the current item.
    pub fn pop_list_frame(&mut self, ts: TagStyle, indent_width: usize, out: &mut String) {
        if matches!(self.open_tags.last(), Some(OpenTag::P)) {
            self.open_tags.pop();
            out.push_str(&ts.close("P"));
            out.push('\n');
        }
        if let Some(frame) = self.list_stack.pop() {
            let pad = " ".repeat(self.list_stack.len() * indent_width);
            if ts.xhtml && frame.li_open {
                out.push_str(&pad);
                out.push_str(&ts.close("LI"));
                out.push('\n');
            }
            out.push_str(&pad);
            out.push_str(&ts.close(if frame.ordered { "OL" } else { "UL" }));
            out.push('\n');
            if let Some(pos) = self
                .open_tags
                .iter()
                .rposition(|t| matches!(t, OpenTag::Ul | OpenTag::Ol))
            {
                self.open_tags.remove(pos);
            }
        }
        self.mode.list = !self.list_stack.is_empty();
    }

    /// Drain every open structural tag at end of input, innermost first.
    /// In HTML mode a top-level paragraph is left open (its end tag is
    /// optional); under XHTML everything closes.
    pub fn drain_open_tags(&mut self, ts: TagStyle, indent_width: usize) -> String {
        let mut out = String::new();
        while let Some(tag) = self.open_tags.pop() {
            match tag {
                OpenTag::P => {
                    if ts.xhtml || !self.open_tags.is_empty() {
                        out.push_str(&ts.close("P"));
                        out.push('\n');
                    }
                }
                OpenTag::Pre => {
                    out.push_str(&ts.close("PRE"));
                    out.push('\n');
                }
                OpenTag::Ul | OpenTag::Ol => {
                    if let Some(frame) = self.list_stack.pop() {
                        let pad = " ".repeat(self.list_stack.len() * indent_width);
                        if ts.xhtml && frame.li_open {
                            out.push_str(&pad);
                            out.push_str(&ts.close("LI"));
                            out.push('\n');
                        }
                        out.push_str(&pad);
                        out.push_str(&ts.close(if frame.ordered { "OL" } else { "UL" }));
                        out.push('\n');
                    }
                }
            }
        }
        self.list_stack.clear();
        self.mode = Mode::default();
        out
    }
}

/// The fixed patterns that depend on option values, compiled once per
/// option set.
#[derive(Clone, Debug)]
pub(crate) struct CompiledPatterns {
    pub custom_headings: Vec<Regex>,
    pub pre_start: Regex,
    pub pre_end: Regex,
    pub hrule: Regex,
    space_run: Regex,
    dot_run: Regex,
}

static DEFAULT_PRE_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(DEFAULT_PRE_START_MARKER).unwrap());
static DEFAULT_PRE_END: Lazy<Regex> = Lazy::new(|| Regex::new(DEFAULT_PRE_END_MARKER).unwrap());

impl CompiledPatterns {
    pub fn compile(opts: &Options) -> Self {
        let mut custom_headings = Vec::new();
        for pattern in &opts.custom_heading_regexp {
            match Regex::new(pattern) {
                Ok(re) => custom_headings.push(re),
                Err(err) => log::warn!("skipping bad heading pattern {pattern:?}: {err}"),
            }
        }
        let pre_start = compile_or(&opts.preformat_start_marker, &DEFAULT_PRE_START);
        let pre_end = compile_or(&opts.preformat_end_marker, &DEFAULT_PRE_END);
        let hrule_min = opts.hrule_min.max(1);
        let hrule = Regex::new(&format!(r"^\s*(?:[-_~=*] *){{{hrule_min},}}$"))
            .unwrap_or_else(|_| Regex::new(r"^\s*(?:[-_~=*] *){4,}$").unwrap());
        let ws_min = opts.preformat_whitespace_min.max(1);
        let space_run = Regex::new(&format!(r" {{{ws_min},}}\S"))
            .unwrap_or_else(|_| Regex::new(r" {5,}\S").unwrap());
        let dot_run = Regex::new(&format!(r"\.{{{ws_min},}}\S"))
            .unwrap_or_else(|_| Regex::new(r"\.{5,}\S").unwrap());
        Self {
            custom_headings,
            pre_start,
            pre_end,
            hrule,
            space_run,
            dot_run,
        }
    }

    /// A line "looks preformatted" when it carries a long internal run of
    /// spaces or dots followed by more content.
    pub fn preformat_looking(&self, text: &str) -> bool {
        self.space_run.is_match(text) || self.dot_run.is_match(text)
    }
}

fn compile_or(pattern: &str, fallback: &Lazy<Regex>) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(err) => {
            log::warn!("bad preformat marker {pattern:?}: {err}; using default");
            (*fallback).clone()
        }
    }
}

static MAILQUOTE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^ *(?:&gt;|[>|:])(?: *(?:&gt;|[>|:]))* ?").unwrap());
static MAILSTART_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:From|Newsgroups):\s").unwrap());
static MAILFIELD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-\w]+:").unwrap());
static BULLET_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^( *)([-*=o·]+)( +)\S").unwrap());
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^( *)(\d+|[A-Za-z])([.)\]:])( +)\S").unwrap());
static HYPHEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([ \t\n]|^)(\p{L}*)-\n([ \t]*)(\p{L}+[)\]}.,:;'"]*[ \t]*)"#).unwrap()
});

const UNDERLINE_CHARS: [char; 6] = ['=', '-', '*', '.', '~', '+'];
const MOSAIC_CHARS: [char; 4] = ['*', '=', '+', '-'];

fn underline_char(text: &str) -> Option<char> {
    let trimmed = text.trim();
    let mut chars = trimmed.chars();
    let first = chars.next()?;
    if !UNDERLINE_CHARS.contains(&first) {
        return None;
    }
    if chars.all(|c| c == first) {
        Some(first)
    } else {
        None
    }
}

/// Mosaic-convention fixed heading levels.
fn mosaic_level(ch: char) -> u8 {
    match ch {
        '*' => 1,
        '=' => 2,
        '+' => 3,
        '-' => 4,
        '~' => 5,
        _ => 6,
    }
}

fn is_all_caps(text: &str, min_len: usize) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.contains('<') {
        return false;
    }
    if trimmed.chars().any(|c| c.is_lowercase()) {
        return false;
    }
    let mut run = 0usize;
    let mut best = 0usize;
    for ch in trimmed.chars() {
        if ch.is_uppercase() {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best >= min_len.max(1)
}

/// A recognized list item marker.
#[derive(Clone, Debug)]
struct ListMarker {
    prefix: String,
    raw_len: usize,
    ordered: bool,
    number: String,
    content_start: usize,
}

/// Column extents `(start, end)` over the OR mask. A column runs from its
/// first non-space position to the start of the following gutter (a run of
/// two or more mask spaces); interior single spaces stay in the column.
fn find_columns(mask: &[u8]) -> Vec<(usize, usize)> {
    let len = mask.len();
    let mut columns = Vec::new();
    let mut i = 0;
    while i < len && mask[i] == b' ' {
        i += 1;
    }
    while i < len {
        let start = i;
        let end;
        loop {
            while i < len && mask[i] != b' ' {
                i += 1;
            }
            if i >= len {
                end = len;
                break;
            }
            let run_start = i;
            while i < len && mask[i] == b' ' {
                i += 1;
            }
            if i - run_start >= 2 || i >= len {
                end = run_start;
                break;
            }
        }
        columns.push((start, end));
    }
    columns
}

fn list_marker(text: &str) -> Option<ListMarker> {
    // Bullets first: `o ` is a bullet, `o.` falls through to the
    // letter-item form.
    if let Some(caps) = BULLET_RE.captures(text) {
        let marks_end = caps.get(2)?.end();
        let spaces = caps.get(3)?;
        let prefix = text[..marks_end + 1].to_string();
        return Some(ListMarker {
            raw_len: prefix.chars().count(),
            prefix,
            ordered: false,
            number: String::new(),
            content_start: spaces.end(),
        });
    }
    if let Some(caps) = NUMBER_RE.captures(text) {
        let ws = caps.get(1)?.as_str();
        let number = caps.get(2)?.as_str();
        let punct = caps.get(3)?.as_str();
        let spaces = caps.get(4)?;
        return Some(ListMarker {
            prefix: format!("{ws}{punct}"),
            raw_len: ws.chars().count() + number.chars().count() + punct.chars().count(),
            ordered: true,
            number: number.to_string(),
            content_start: spaces.end(),
        });
    }
    None
}

struct Pass<'a> {
    opts: &'a Options,
    pats: &'a CompiledPatterns,
    ts: TagStyle,
    state: &'a mut AnalyzerState,
}

/// Run the full pass sequence over one paragraph and return its HTML.
pub(crate) fn process_paragraph(
    opts: &Options,
    pats: &CompiledPatterns,
    ts: TagStyle,
    state: &mut AnalyzerState,
    raw_lines: &[&str],
    trailing_newline: bool,
) -> String {
    let mut lines: Vec<Line> = Vec::with_capacity(raw_lines.len());
    let mut prev_indent = state.prev_indent;
    for raw in raw_lines {
        let line = Line::normalize(raw, opts.tab_width, prev_indent);
        prev_indent = line.indent;
        lines.push(line);
    }
    state.prev_indent = prev_indent;
    let mut actions = vec![LineAction::default(); lines.len()];

    let mut pass = Pass {
        opts,
        pats,
        ts,
        state,
    };
    let is_table = pass.try_table(&mut lines, &mut actions);
    if !is_table {
        pass.escape_pass(&mut lines, &actions);
        pass.mail_pass(&mut lines, &mut actions);
        pass.pre_end_pass(&mut lines, &mut actions);
        pass.hrule_pass(&mut lines, &mut actions);
        pass.custom_heading_pass(&mut lines, &mut actions);
        pass.list_pass(&mut lines, &mut actions);
        pass.pre_start_pass(&mut lines, &mut actions);
        pass.underline_pass(&mut lines, &mut actions);
        pass.paragraph_pass(&mut lines, &mut actions);
        pass.shortline_pass(&mut lines, &mut actions);
        pass.caps_pass(&mut lines, &mut actions);
    }

    let mut out = String::new();
    for (i, line) in lines.iter().enumerate() {
        out.push_str(&line.tags_before);
        out.push_str(&line.text);
        out.push_str(&line.tags_after);
        if i + 1 < lines.len() || trailing_newline {
            out.push('\n');
        }
    }

    let skip_hyphen = !opts.unhyphenation
        || is_table
        || actions
            .iter()
            .any(|a| a.pre || a.header || a.mailheader || a.table);
    let out = if skip_hyphen { out } else { unhyphenate(&out) };

    state.prev_action = actions.last().copied().unwrap_or_default();
    state.mail_header_active = false;
    state.mode.table = false;
    out
}

fn unhyphenate(text: &str) -> String {
    HYPHEN_RE.replace_all(text, "${1}${2}${4}\n${3}").to_string()
}

impl<'a> Pass<'a> {
    /// Pop an open paragraph, emitting its close tag; a block element is
    /// about to open and cannot nest inside it.
    fn close_para_for_block(&mut self, out: &mut String) {
        if let Some(pos) = self.state.open_tags.iter().rposition(|t| *t == OpenTag::P) {
            self.state.open_tags.remove(pos);
            out.push_str(&self.ts.close("P"));
            out.push('\n');
        }
    }

    fn open_para_on(&mut self, line: &mut Line, action: &mut LineAction) {
        // A still-open paragraph is ended implicitly in HTML mode,
        // explicitly under XHTML.
        if let Some(pos) = self.state.open_tags.iter().rposition(|t| *t == OpenTag::P) {
            self.state.open_tags.remove(pos);
            if self.ts.xhtml {
                line.tags_before.push_str(&self.ts.close("P"));
                line.tags_before.push('\n');
            }
        }
        line.tags_before.push_str(&self.ts.open("P"));
        self.state.open_tags.push(OpenTag::P);
        action.par = true;
    }

    // Pass 1: a paragraph of two or more rows sharing two or more
    // all-space columns renders as a table and suppresses every later
    // pass.
    fn try_table(&mut self, lines: &mut [Line], actions: &mut [LineAction]) -> bool {
        if !self.opts.make_tables || self.state.mode.pre || lines.len() < 2 {
            return false;
        }
        let min_len = match lines.iter().map(|l| l.orig.len()).min() {
            Some(len) if len > 0 => len,
            _ => return false,
        };
        let mut mask = vec![0u8; min_len];
        for line in lines.iter() {
            for (i, byte) in line.orig.as_bytes()[..min_len].iter().enumerate() {
                mask[i] |= byte;
            }
        }
        // A column boundary is a gutter: a run of at least two positions
        // that are spaces in every row. A single shared space is just
        // coincidental word alignment and stays inside its column.
        let columns = find_columns(&mask);
        if columns.len() < 2 {
            return false;
        }

        let aligns = self.column_aligns(lines, &columns);
        let tr = self.ts.name("TR");
        let td = self.ts.name("TD");
        let align_attr = self.ts.name("ALIGN");
        for (idx, line) in lines.iter_mut().enumerate() {
            let bytes = line.orig.as_bytes().to_vec();
            let mut row = format!("<{tr}>");
            for (k, &(start, end)) in columns.iter().enumerate() {
                let start = start.min(bytes.len());
                let end = if k + 1 == columns.len() {
                    bytes.len()
                } else {
                    end.min(bytes.len())
                };
                let cell = String::from_utf8_lossy(&bytes[start..end.max(start)]);
                let cell = cell.trim();
                let cell = if self.opts.escape_html_chars {
                    escape_html(cell)
                } else {
                    cell.to_string()
                };
                row.push_str(&format!(
                    "<{td} {align_attr}=\"{}\">{cell}</{td}>",
                    self.ts.name(aligns[k])
                ));
            }
            row.push_str(&format!("</{tr}>"));
            line.text = row;
            actions[idx].table = true;
        }
        let mut before = String::new();
        self.close_para_for_block(&mut before);
        before.push_str(&self.ts.open("TABLE"));
        before.push('\n');
        lines[0].tags_before.push_str(&before);
        if let Some(last) = lines.last_mut() {
            last.tags_after.push('\n');
            last.tags_after.push_str(&self.ts.close("TABLE"));
        }
        self.state.mode.table = true;
        true
    }

    /// Majority vote per column: space on both sides of a cell votes
    /// center, right-only votes left, left-only votes right. Ties and
    /// no-information columns fall back to left.
    fn column_aligns(&self, lines: &[Line], columns: &[(usize, usize)]) -> Vec<&'static str> {
        let mut aligns = Vec::with_capacity(columns.len());
        for (k, &(start, end)) in columns.iter().enumerate() {
            let mut left = 0usize;
            let mut center = 0usize;
            let mut right = 0usize;
            for line in lines {
                let bytes = line.orig.as_bytes();
                let end = if k + 1 == columns.len() {
                    bytes.len()
                } else {
                    end.min(bytes.len())
                };
                let start = start.min(bytes.len());
                if start >= end {
                    continue;
                }
                let cell = &bytes[start..end];
                if cell.iter().all(|&b| b == b' ') {
                    continue;
                }
                let left_space = cell.first() == Some(&b' ');
                let right_space = cell.last() == Some(&b' ');
                match (left_space, right_space) {
                    (true, true) => center += 1,
                    (false, true) => left += 1,
                    (true, false) => right += 1,
                    (false, false) => {}
                }
            }
            let align = if center > left && center > right {
                "CENTER"
            } else if right > left && right > center {
                "RIGHT"
            } else {
                "LEFT"
            };
            aligns.push(align);
        }
        aligns
    }

    // Pass 2: escape the HTML-significant characters.
    fn escape_pass(&mut self, lines: &mut [Line], actions: &[LineAction]) {
        if !self.opts.escape_html_chars {
            return;
        }
        for (i, line) in lines.iter_mut().enumerate() {
            if actions[i].table {
                continue;
            }
            line.text = escape_html(&line.text);
        }
    }

    // Pass 3: mail quotes, message starts and header continuations.
    fn mail_pass(&mut self, lines: &mut [Line], actions: &mut [LineAction]) {
        if !self.opts.mailmode {
            return;
        }
        let mut in_quote_run = false;
        for i in 0..lines.len() {
            if actions[i].table || actions[i].pre || lines[i].blank {
                in_quote_run = false;
                continue;
            }
            if MAILSTART_RE.is_match(&lines[i].text) && !self.state.mail_header_active {
                lines[i].tags_before.push_str("<!-- New Message -->\n");
                self.open_para_on(&mut lines[i], &mut actions[i]);
                if self.opts.make_anchors {
                    self.state.mail_count += 1;
                    lines[i].text = format!(
                        "<{a} {name}=\"mail{n}\">{}</{a}>",
                        lines[i].text,
                        a = self.ts.name("A"),
                        name = self.ts.name("NAME"),
                        n = self.state.mail_count,
                    );
                }
                lines[i].tags_after.push_str(&self.ts.empty("BR"));
                actions[i].mailheader = true;
                actions[i].brk = true;
                self.state.mail_header_active = true;
                in_quote_run = false;
                continue;
            }
            if self.state.mail_header_active
                && (MAILFIELD_RE.is_match(&lines[i].text) || lines[i].indent > 0)
            {
                lines[i].tags_after.push_str(&self.ts.empty("BR"));
                actions[i].mailheader = true;
                actions[i].brk = true;
                continue;
            }
            self.state.mail_header_active = false;
            if MAILQUOTE_RE.is_match(&lines[i].text) {
                if !in_quote_run {
                    self.open_para_on(&mut lines[i], &mut actions[i]);
                }
                lines[i].tags_after.push_str(&self.ts.empty("BR"));
                actions[i].mailquote = true;
                actions[i].brk = true;
                in_quote_run = true;
            } else {
                in_quote_run = false;
            }
        }
    }

    // Pass 4: end a preformatted region carried in from earlier
    // paragraphs, before any structural pass can touch its lines.
    fn pre_end_pass(&mut self, lines: &mut [Line], actions: &mut [LineAction]) {
        if !self.state.mode.pre {
            return;
        }
        for i in 0..lines.len() {
            if !self.state.mode.pre {
                break;
            }
            self.pre_region_step(lines, actions, i);
        }
    }

    /// Advance the open preformat region over line `i`: keep the line
    /// inside, or close the region at it.
    fn pre_region_step(&mut self, lines: &mut [Line], actions: &mut [LineAction], i: usize) {
        if self.state.mode.pre_explicit {
            if self.pats.pre_end.is_match(&lines[i].text) {
                lines[i].text = self.ts.close("PRE");
                self.pop_pre();
                actions[i].end = true;
            } else {
                actions[i].pre = true;
            }
            return;
        }
        if self.opts.preformat_trigger_lines == 0 || self.opts.endpreformat_trigger_lines == 0 {
            actions[i].pre = true;
            return;
        }
        let looking = self.pats.preformat_looking(&lines[i].orig);
        if !looking {
            let next_not_looking = lines
                .get(i + 1)
                .map(|l| !self.pats.preformat_looking(&l.orig))
                .unwrap_or(true);
            if self.opts.endpreformat_trigger_lines == 1 || next_not_looking {
                let mut close = self.ts.close("PRE");
                close.push('\n');
                lines[i].tags_before.push_str(&close);
                self.pop_pre();
                return;
            }
        }
        actions[i].pre = true;
    }

    fn pop_pre(&mut self) {
        self.state.mode.pre = false;
        self.state.mode.pre_explicit = false;
        if let Some(pos) = self
            .state
            .open_tags
            .iter()
            .rposition(|t| *t == OpenTag::Pre)
        {
            self.state.open_tags.remove(pos);
        }
    }

    fn push_pre(&mut self, explicit: bool) {
        self.state.mode.pre = true;
        self.state.mode.pre_explicit = explicit;
        self.state.open_tags.push(OpenTag::Pre);
    }

    // Pass 5: horizontal rules. A dash run that underlines the previous
    // line belongs to the heading pass, not here.
    fn hrule_pass(&mut self, lines: &mut [Line], actions: &mut [LineAction]) {
        for i in 0..lines.len() {
            if actions[i].pre || actions[i].table || actions[i].mailquote || actions[i].mailheader
            {
                continue;
            }
            let underlines_prev = i > 0
                && !lines[i - 1].is_blank_now()
                && !actions[i - 1].structural()
                && self.underline_for(&lines[i - 1], &lines[i]).is_some();
            if underlines_prev {
                continue;
            }
            if self.pats.hrule.is_match(&lines[i].text) {
                lines[i].text = self.ts.empty("HR");
                actions[i].hrule = true;
                actions[i].end = true;
            } else if lines[i].text.contains('\u{0C}') {
                let hr = format!("\n{}\n", self.ts.empty("HR"));
                lines[i].text = lines[i].text.replace('\u{0C}', &hr);
                actions[i].hrule = true;
            }
        }
    }

    // Pass 6: user-supplied heading patterns, first match per line wins.
    fn custom_heading_pass(&mut self, lines: &mut [Line], actions: &mut [LineAction]) {
        if self.pats.custom_headings.is_empty() {
            return;
        }
        for i in 0..lines.len() {
            if actions[i].structural() || actions[i].table || actions[i].end
                || lines[i].is_blank_now()
            {
                continue;
            }
            let matched = self
                .pats
                .custom_headings
                .iter()
                .position(|re| re.is_match(&lines[i].text));
            if let Some(ci) = matched {
                let level = if self.opts.explicit_headings {
                    (ci + 1).min(6) as u8
                } else {
                    self.style_level(HeadingStyle::Custom(ci))
                };
                self.make_heading(&mut lines[i], &mut actions[i], level);
            }
        }
    }

    // Pass 7: lists.
    fn list_pass(&mut self, lines: &mut [Line], actions: &mut [LineAction]) {
        for i in 0..lines.len() {
            if actions[i].pre
                || actions[i].table
                || actions[i].header
                || actions[i].hrule
                || actions[i].mailquote
                || actions[i].mailheader
                || lines[i].is_blank_now()
            {
                continue;
            }
            match list_marker(&lines[i].text) {
                None => {
                    // An outdented plain line leaves the frames it has
                    // stepped out of.
                    let mut closes = String::new();
                    while let Some(top_indent) =
                        self.state.list_stack.last().map(|f| f.indent)
                    {
                        if lines[i].indent < top_indent {
                            self.state
                                .pop_list_frame(self.ts, self.opts.indent_width, &mut closes);
                        } else {
                            break;
                        }
                    }
                    if !closes.is_empty() {
                        lines[i].tags_before.push_str(&closes);
                    }
                }
                Some(marker) => {
                    if let Some(pos) = self
                        .state
                        .list_stack
                        .iter()
                        .rposition(|f| f.prefix == marker.prefix)
                    {
                        // Back up to an ancestor frame.
                        let mut closes = String::new();
                        while self.state.list_stack.len() > pos + 1 {
                            self.state
                                .pop_list_frame(self.ts, self.opts.indent_width, &mut closes);
                        }
                        lines[i].tags_before.push_str(&closes);
                        self.continue_item(&mut lines[i], &mut actions[i], &marker);
                    } else {
                        let allowed = if self.state.list_stack.is_empty() {
                            let prev = if i == 0 {
                                self.state.prev_action
                            } else {
                                actions[i - 1]
                            };
                            i == 0
                                || lines[i].indent > 0
                                || lines[i - 1].is_blank_now()
                                || prev.brk
                                || prev.header
                                || prev.caps
                        } else {
                            true
                        };
                        let ordered_ok = !marker.ordered
                            || matches!(marker.number.as_str(), "1" | "a" | "A");
                        if allowed && ordered_ok {
                            self.start_list(&mut lines[i], &mut actions[i], &marker);
                            self.continue_item(&mut lines[i], &mut actions[i], &marker);
                        }
                    }
                }
            }
        }
    }

    fn start_list(&mut self, line: &mut Line, action: &mut LineAction, marker: &ListMarker) {
        let mut before = String::new();
        self.close_para_for_block(&mut before);
        let pad = " ".repeat(self.state.list_stack.len() * self.opts.indent_width);
        before.push_str(&pad);
        before.push_str(&self.ts.open(if marker.ordered { "OL" } else { "UL" }));
        before.push('\n');
        line.tags_before.push_str(&before);
        self.state.list_stack.push(ListFrame {
            prefix: marker.prefix.clone(),
            ordered: marker.ordered,
            indent: marker.raw_len,
            li_open: false,
        });
        self.state.open_tags.push(if marker.ordered {
            OpenTag::Ol
        } else {
            OpenTag::Ul
        });
        self.state.mode.list = true;
        action.list_start = true;
    }

    fn continue_item(&mut self, line: &mut Line, action: &mut LineAction, marker: &ListMarker) {
        let depth = self.state.list_stack.len();
        let pad = " ".repeat(depth.saturating_sub(1) * self.opts.indent_width);
        let xhtml = self.ts.xhtml;
        let li_close = self.ts.close("LI");
        let li_open = self.ts.open("LI");
        let frame = match self.state.list_stack.last_mut() {
            Some(frame) => frame,
            None => return,
        };
        let mut item = String::new();
        if xhtml && frame.li_open {
            item.push_str(&pad);
            item.push_str(&li_close);
            item.push('\n');
        }
        item.push_str(&pad);
        item.push_str(&li_open);
        let content = line.text[marker.content_start.min(line.text.len())..].to_string();
        line.text = format!("{item}{content}");
        frame.li_open = true;
        action.list = true;
        action.list_item = true;
    }

    // Pass 8: unmarked preformat entry, and the explicit start marker. A
    // region opened here may also end here; carried-in regions were
    // handled by pass 4.
    fn pre_start_pass(&mut self, lines: &mut [Line], actions: &mut [LineAction]) {
        for i in 0..lines.len() {
            if actions[i].pre || actions[i].table {
                continue;
            }
            if self.state.mode.pre {
                self.pre_region_step(lines, actions, i);
                continue;
            }
            if actions[i].structural() || lines[i].is_blank_now() {
                continue;
            }
            if self.opts.use_preformat_marker && self.pats.pre_start.is_match(&lines[i].text) {
                let mut before = std::mem::take(&mut lines[i].tags_before);
                self.close_para_for_block(&mut before);
                lines[i].tags_before = before;
                lines[i].text = self.ts.open("PRE");
                self.push_pre(true);
                actions[i].pre = true;
                continue;
            }
            if self.opts.preformat_trigger_lines > 0
                && self.pats.preformat_looking(&lines[i].orig)
            {
                let triggered = self.opts.preformat_trigger_lines == 1
                    || lines
                        .get(i + 1)
                        .map(|l| self.pats.preformat_looking(&l.orig))
                        .unwrap_or(false);
                if triggered {
                    let mut before = std::mem::take(&mut lines[i].tags_before);
                    self.close_para_for_block(&mut before);
                    before.push_str(&self.ts.open("PRE"));
                    before.push('\n');
                    lines[i].tags_before = before;
                    self.push_pre(false);
                    actions[i].pre = true;
                }
            }
        }
    }

    // Pass 9: underlined headings.
    fn underline_pass(&mut self, lines: &mut [Line], actions: &mut [LineAction]) {
        let mut i = 0;
        while i + 1 < lines.len() {
            if actions[i].structural()
                || actions[i].table
                || actions[i].end
                || lines[i].is_blank_now()
                || actions[i + 1].structural()
                || actions[i + 1].table
            {
                i += 1;
                continue;
            }
            let ch = match self.underline_for(&lines[i], &lines[i + 1]) {
                Some(ch) => ch,
                None => {
                    i += 1;
                    continue;
                }
            };
            let caps = is_all_caps(&lines[i].orig, self.opts.min_caps_length);
            let level = if self.opts.use_mosaic_header {
                mosaic_level(ch)
            } else {
                self.style_level(HeadingStyle::Underline { ch, caps })
            };
            self.make_heading(&mut lines[i], &mut actions[i], level);
            // The underline itself is spent.
            lines[i + 1].text = " ".to_string();
            i += 2;
        }
    }

    /// The character of `under` when it underlines `text_line` within the
    /// length and offset tolerances.
    fn underline_for(&self, text_line: &Line, under: &Line) -> Option<char> {
        let ch = underline_char(&under.orig)?;
        if self.opts.use_mosaic_header && !MOSAIC_CHARS.contains(&ch) {
            return None;
        }
        let text_len = text_line.orig.trim().chars().count();
        if text_len == 0 {
            return None;
        }
        let under_len = under.orig.trim().chars().count();
        if under_len.abs_diff(text_len) > self.opts.underline_length_tolerance {
            return None;
        }
        if under.indent.abs_diff(text_line.indent) > self.opts.underline_offset_tolerance {
            return None;
        }
        Some(ch)
    }

    fn style_level(&mut self, style: HeadingStyle) -> u8 {
        if let Some(pos) = self
            .state
            .heading_styles
            .iter()
            .position(|s| *s == style)
        {
            (pos + 1).min(6) as u8
        } else {
            self.state.heading_styles.push(style);
            self.state.heading_styles.len().min(6) as u8
        }
    }

    fn next_anchor(&mut self, level: u8) -> String {
        let level = level as usize;
        let counters = &mut self.state.heading_counters;
        counters.truncate(level);
        while counters.len() < level {
            counters.push(0);
        }
        counters[level - 1] += 1;
        let parts: Vec<String> = counters.iter().map(|c| c.to_string()).collect();
        format!("section_{}", parts.join("_"))
    }

    fn make_heading(&mut self, line: &mut Line, action: &mut LineAction, level: u8) {
        let mut before = std::mem::take(&mut line.tags_before);
        self.close_para_for_block(&mut before);
        line.tags_before = before;
        let tag = format!("H{level}");
        let inner = line.text.trim().to_string();
        line.text = if self.opts.make_anchors {
            let anchor = self.next_anchor(level);
            format!(
                "{}<{a} {name}=\"{anchor}\">{inner}</{a}>{}",
                self.ts.open(&tag),
                self.ts.close(&tag),
                a = self.ts.name("A"),
                name = self.ts.name("NAME"),
            )
        } else {
            format!("{}{inner}{}", self.ts.open(&tag), self.ts.close(&tag))
        };
        action.header = true;
        action.end = true;
    }

    // Pass 10: paragraph starts.
    fn paragraph_pass(&mut self, lines: &mut [Line], actions: &mut [LineAction]) {
        for i in 0..lines.len() {
            let a = actions[i];
            if a.pre
                || a.table
                || a.structural()
                || a.end
                || a.caps
                || a.brk
                || a.par
                || a.ind_break
                || lines[i].is_blank_now()
            {
                continue;
            }
            let prev_blank = i == 0 || lines[i - 1].is_blank_now();
            let prev_end = i > 0 && actions[i - 1].end;
            let indent_jump = i > 0
                && !lines[i - 1].is_blank_now()
                && lines[i].indent > lines[i - 1].indent + self.opts.par_indent;
            if !(prev_blank || prev_end || indent_jump) {
                continue;
            }
            if indent_jump && self.opts.indent_par_break && !prev_blank && !prev_end {
                let indent = lines[i].indent;
                let stripped = lines[i].text.trim_start_matches(' ').to_string();
                lines[i].text =
                    format!("{}{}{stripped}", self.ts.empty("BR"), "&nbsp;".repeat(indent));
                actions[i].ind_break = true;
                continue;
            }
            self.open_para_on(&mut lines[i], &mut actions[i]);
            if self.opts.preserve_indent && lines[i].indent > 0 {
                let indent = lines[i].indent;
                let stripped = lines[i].text.trim_start_matches(' ').to_string();
                lines[i].text = format!("{}{stripped}", "&nbsp;".repeat(indent));
            }
        }
    }

    // Pass 11: a short line keeps its visual break.
    fn shortline_pass(&mut self, lines: &mut [Line], actions: &mut [LineAction]) {
        for i in 1..lines.len() {
            let prev = actions[i - 1];
            let cur = actions[i];
            if prev.pre
                || prev.table
                || prev.list
                || prev.list_item
                || prev.brk
                || prev.header
                || prev.hrule
                || prev.caps
                || prev.mailquote
                || prev.mailheader
                || prev.end
            {
                continue;
            }
            if cur.pre
                || cur.table
                || cur.list
                || cur.list_item
                || cur.header
                || cur.hrule
                || cur.end
                || cur.par
                || cur.ind_break
                || cur.mailquote
                || cur.mailheader
            {
                continue;
            }
            if lines[i - 1].is_blank_now() || lines[i].is_blank_now() {
                continue;
            }
            let len = lines[i - 1].orig.chars().count();
            if len == 0 || len >= self.opts.short_line_length {
                continue;
            }
            let br = self.ts.empty("BR");
            lines[i - 1].tags_after.push_str(&br);
            actions[i - 1].brk = true;
        }
    }

    // Pass 12: lines shouted in capitals.
    fn caps_pass(&mut self, lines: &mut [Line], actions: &mut [LineAction]) {
        for i in 0..lines.len() {
            let a = actions[i];
            if a.pre
                || a.table
                || a.header
                || a.hrule
                || a.mailquote
                || a.mailheader
                || a.list_item
                || lines[i].is_blank_now()
            {
                continue;
            }
            if is_all_caps(&lines[i].orig, self.opts.min_caps_length) {
                lines[i].text = format!(
                    "{}{}{}",
                    self.ts.open(&self.opts.caps_tag),
                    lines[i].text,
                    self.ts.close(&self.opts.caps_tag)
                );
                actions[i].caps = true;
            }
        }
    }
}
