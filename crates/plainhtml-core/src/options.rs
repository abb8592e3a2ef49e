//! Conversion options.
//!
//! A plain struct of named knobs with the documented defaults. `validated`
//! applies the clamping rules once when the converter takes ownership, so
//! the analyzer can trust the ranges.

use std::path::PathBuf;

pub const DEFAULT_DOCTYPE: &str = "-//W3C//DTD HTML 3.2 Final//EN";
pub const XHTML_DOCTYPE: &str = "-//W3C//DTD XHTML 1.0 Transitional//EN";

/// Default markers match a `<pre>`/`</pre>` alone on a line, in either the
/// raw or the already-escaped form.
pub const DEFAULT_PRE_START_MARKER: &str = r"^\s*(?:&lt;|<)pre(?:&gt;|>)\s*$";
pub const DEFAULT_PRE_END_MARKER: &str = r"^\s*(?:&lt;|<)/pre(?:&gt;|>)\s*$";

#[derive(Clone, Debug)]
pub struct Options {
    /// File spliced verbatim before `</BODY>`.
    pub append_file: Option<PathBuf>,
    /// File spliced verbatim into `<HEAD>`.
    pub append_head: Option<PathBuf>,
    /// File spliced verbatim after `<BODY>`.
    pub prepend_file: Option<PathBuf>,
    /// Attribute string carried on the `<BODY>` tag.
    pub body_deco: String,
    /// Tag wrapped around all-caps lines.
    pub caps_tag: String,
    /// User heading patterns, in priority order.
    pub custom_heading_regexp: Vec<String>,
    /// Personal link dictionary file.
    pub default_link_dict: Option<PathBuf>,
    /// Site link dictionary file; unset means the built-in standard
    /// dictionary.
    pub system_link_dict: Option<PathBuf>,
    /// Extra diagnostic dumps for dictionary loading (tracing only).
    pub dict_debug: u32,
    /// Extra diagnostic dumps for conversion (tracing only).
    pub debug: u32,
    pub doctype: String,
    /// Leave bytes above 0xA0 alone instead of emitting named entities.
    pub eight_bit_clean: bool,
    pub escape_html_chars: bool,
    /// Custom heading patterns map to fixed levels by position.
    pub explicit_headings: bool,
    /// Emit body content only, no envelope.
    pub extract: bool,
    pub hrule_min: usize,
    pub indent_width: usize,
    pub indent_par_break: bool,
    pub infile: Vec<PathBuf>,
    pub links_dictionaries: Vec<PathBuf>,
    /// Skip all structural analysis and escaping; only apply the link
    /// dictionary.
    pub link_only: bool,
    pub lower_case_tags: bool,
    pub mailmode: bool,
    pub make_anchors: bool,
    pub make_links: bool,
    pub make_tables: bool,
    pub min_caps_length: usize,
    pub outfile: String,
    pub par_indent: usize,
    pub preformat_trigger_lines: usize,
    pub endpreformat_trigger_lines: usize,
    pub preformat_start_marker: String,
    pub preformat_end_marker: String,
    pub preformat_whitespace_min: usize,
    pub preserve_indent: bool,
    pub short_line_length: usize,
    pub style_url: Option<String>,
    pub tab_width: usize,
    pub title: Option<String>,
    pub titlefirst: bool,
    pub underline_length_tolerance: usize,
    pub underline_offset_tolerance: usize,
    pub unhyphenation: bool,
    pub use_mosaic_header: bool,
    pub use_preformat_marker: bool,
    pub xhtml: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            append_file: None,
            append_head: None,
            prepend_file: None,
            body_deco: String::new(),
            caps_tag: "STRONG".to_string(),
            custom_heading_regexp: Vec::new(),
            default_link_dict: None,
            system_link_dict: None,
            dict_debug: 0,
            debug: 0,
            doctype: DEFAULT_DOCTYPE.to_string(),
            eight_bit_clean: false,
            escape_html_chars: true,
            explicit_headings: false,
            extract: false,
            hrule_min: 4,
            indent_width: 2,
            indent_par_break: false,
            infile: Vec::new(),
            links_dictionaries: Vec::new(),
            link_only: false,
            lower_case_tags: false,
            mailmode: false,
            make_anchors: true,
            make_links: true,
            make_tables: false,
            min_caps_length: 3,
            outfile: "-".to_string(),
            par_indent: 2,
            preformat_trigger_lines: 2,
            endpreformat_trigger_lines: 2,
            preformat_start_marker: DEFAULT_PRE_START_MARKER.to_string(),
            preformat_end_marker: DEFAULT_PRE_END_MARKER.to_string(),
            preformat_whitespace_min: 5,
            preserve_indent: false,
            short_line_length: 40,
            style_url: None,
            tab_width: 8,
            title: None,
            titlefirst: false,
            underline_length_tolerance: 1,
            underline_offset_tolerance: 1,
            unhyphenation: true,
            use_mosaic_header: false,
            use_preformat_marker: false,
            xhtml: false,
        }
    }
}

impl Options {
    /// Apply the documented clamps and implications.
    pub(crate) fn validated(mut self) -> Self {
        self.preformat_trigger_lines = self.preformat_trigger_lines.min(2);
        self.endpreformat_trigger_lines = self.endpreformat_trigger_lines.min(2);
        if self.preformat_trigger_lines == 0 {
            self.endpreformat_trigger_lines = 1;
        }
        if self.xhtml {
            self.lower_case_tags = true;
            self.doctype = XHTML_DOCTYPE.to_string();
        }
        if self.tab_width == 0 {
            self.tab_width = 8;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::Options;

    #[test]
    fn defaults_match_the_documented_table() {
        let opts = Options::default();
        assert_eq!(opts.caps_tag, "STRONG");
        assert_eq!(opts.hrule_min, 4);
        assert_eq!(opts.short_line_length, 40);
        assert_eq!(opts.preformat_whitespace_min, 5);
        assert_eq!(opts.tab_width, 8);
        assert!(opts.make_links && opts.make_anchors);
        assert!(!opts.make_tables);
    }

    #[test]
    fn validation_clamps_triggers() {
        let opts = Options {
            preformat_trigger_lines: 9,
            endpreformat_trigger_lines: 9,
            ..Options::default()
        }
        .validated();
        assert_eq!(opts.preformat_trigger_lines, 2);
        assert_eq!(opts.endpreformat_trigger_lines, 2);

        let opts = Options {
            preformat_trigger_lines: 0,
            ..Options::default()
        }
        .validated();
        assert_eq!(opts.endpreformat_trigger_lines, 1);
    }

    #[test]
    fn xhtml_forces_lowercase_tags() {
        let opts = Options {
            xhtml: true,
            ..Options::default()
        }
        .validated();
        assert!(opts.lower_case_tags);
        assert!(opts.doctype.contains("XHTML"));
    }
}
