//! The converter instance and document assembler.
//!
//! A [`TextToHtml`] owns the options, the compiled dictionary (shareable
//! across instances), the once/section memo and the analyzer carry-over
//! state. Operations on one instance must not be interleaved; separate
//! instances are independent.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analyze::{self, escape_html, AnalyzerState, CompiledPatterns, OpenTag};
use crate::dict::{LinkDictionary, OnceMemo};
use crate::entities;
use crate::error::Result;
use crate::links;
use crate::options::Options;
use crate::tags::TagStyle;

pub struct TextToHtml {
    options: Options,
    patterns: CompiledPatterns,
    dict: Option<Arc<LinkDictionary>>,
    memo: OnceMemo,
    state: AnalyzerState,
}

impl TextToHtml {
    pub fn new(options: Options) -> Self {
        let options = options.validated();
        let patterns = CompiledPatterns::compile(&options);
        Self {
            options,
            patterns,
            dict: None,
            memo: OnceMemo::default(),
            state: AnalyzerState::new(),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Replace the option set between documents. Dictionaries reload on
    /// the next conversion.
    pub fn set_options(&mut self, options: Options) {
        self.options = options.validated();
        self.patterns = CompiledPatterns::compile(&self.options);
        self.dict = None;
    }

    /// Install a pre-compiled (possibly shared) dictionary in place of the
    /// configured dictionary files.
    pub fn set_dictionary(&mut self, dict: Arc<LinkDictionary>) {
        self.memo = OnceMemo::new(dict.len());
        self.dict = Some(dict);
    }

    /// The compiled dictionary, for sharing with other instances.
    pub fn dictionary(&self) -> Option<Arc<LinkDictionary>> {
        self.dict.clone()
    }

    fn tag_style(&self) -> TagStyle {
        TagStyle::new(self.options.lower_case_tags, self.options.xhtml)
    }

    /// Load the configured dictionaries once: the site dictionary (or the
    /// built-in standard one), the personal dictionary, then any extras.
    /// Unreadable files are reported and skipped; parse failures abort.
    fn ensure_dictionary(&mut self) -> Result<()> {
        if self.dict.is_some() {
            return Ok(());
        }
        if !self.options.make_links {
            self.memo = OnceMemo::new(0);
            self.dict = Some(Arc::new(LinkDictionary::default()));
            return Ok(());
        }
        let mut dict = match &self.options.system_link_dict {
            Some(path) => match fs::read_to_string(path) {
                Ok(text) => LinkDictionary::parse(&path.display().to_string(), &text)?,
                Err(err) => {
                    log::warn!(
                        "cannot read system link dictionary {}: {err}; using builtin",
                        path.display()
                    );
                    LinkDictionary::standard()
                }
            },
            None => LinkDictionary::standard(),
        };
        if let Some(path) = &self.options.default_link_dict {
            match fs::read_to_string(path) {
                Ok(text) => dict.extend_from(&path.display().to_string(), &text)?,
                Err(err) => {
                    log::warn!("cannot read link dictionary {}: {err}", path.display())
                }
            }
        }
        for path in self.options.links_dictionaries.clone() {
            match fs::read_to_string(&path) {
                Ok(text) => dict.extend_from(&path.display().to_string(), &text)?,
                Err(err) => {
                    log::warn!("cannot read link dictionary {}: {err}", path.display())
                }
            }
        }
        if self.options.dict_debug != 0 {
            dict.trace_rules();
        }
        self.memo = OnceMemo::new(dict.len());
        self.dict = Some(Arc::new(dict));
        Ok(())
    }

    /// Convert the concatenated contents of `inputs` into a complete HTML
    /// document on `output`. Unreadable inputs are reported and skipped;
    /// with no readable input the body is empty.
    pub fn convert_document<R: Read, W: Write>(
        &mut self,
        inputs: &mut [R],
        output: &mut W,
    ) -> Result<()> {
        let mut text = String::new();
        for (idx, input) in inputs.iter_mut().enumerate() {
            let mut buf = String::new();
            match input.read_to_string(&mut buf) {
                Ok(_) => text.push_str(&buf),
                Err(err) => log::warn!("cannot read input #{idx}: {err}"),
            }
        }
        self.convert_text(&text, output)
    }

    /// Path-taking variant of [`convert_document`][Self::convert_document].
    pub fn convert_files<W: Write>(&mut self, paths: &[PathBuf], output: &mut W) -> Result<()> {
        let mut text = String::new();
        for path in paths {
            match fs::read_to_string(path) {
                Ok(contents) => text.push_str(&contents),
                Err(err) => log::warn!("cannot read input {}: {err}", path.display()),
            }
        }
        self.convert_text(&text, output)
    }

    fn convert_text<W: Write>(&mut self, text: &str, output: &mut W) -> Result<()> {
        if self.options.debug != 0 {
            log::debug!("converting {} bytes of input", text.len());
        }
        self.state.reset();
        self.ensure_dictionary()?;
        self.memo = OnceMemo::new(self.dict.as_ref().map(|d| d.len()).unwrap_or(0));

        let ts = self.tag_style();
        let mut out = String::new();
        if !self.options.extract {
            out.push_str(&self.envelope_head(text));
        }
        if let Some(path) = self.options.prepend_file.clone() {
            splice_file(&mut out, &path);
        }
        out.push_str(&self.render_body(text));
        out.push_str(&self.state.drain_open_tags(ts, self.options.indent_width));
        if let Some(path) = self.options.append_file.clone() {
            splice_file(&mut out, &path);
        }
        if !self.options.extract {
            out.push_str(&ts.close("BODY"));
            out.push('\n');
            out.push_str(&ts.close("HTML"));
            out.push('\n');
        }
        output.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Convert one or more paragraphs without the document envelope. With
    /// `close_open_tags` false the instance keeps its open structural
    /// context (lists, preformat) for the next call.
    pub fn convert_fragment(&mut self, text: &str, close_open_tags: bool) -> String {
        if let Err(err) = self.ensure_dictionary() {
            log::error!("link dictionary disabled: {err}");
            self.memo = OnceMemo::new(0);
            self.dict = Some(Arc::new(LinkDictionary::default()));
        }
        let mut out = self.render_body(text);
        if close_open_tags {
            let ts = self.tag_style();
            out.push_str(&self.state.drain_open_tags(ts, self.options.indent_width));
        }
        out
    }

    fn envelope_head(&self, source: &str) -> String {
        let ts = self.tag_style();
        let title = self
            .options
            .title
            .clone()
            .or_else(|| {
                if self.options.titlefirst {
                    source
                        .lines()
                        .find(|l| !l.trim().is_empty())
                        .map(|l| l.trim().to_string())
                } else {
                    None
                }
            })
            .unwrap_or_default();
        let mut out = String::new();
        if self.options.xhtml {
            out.push_str(&format!(
                "<!DOCTYPE html PUBLIC \"{}\" \
                 \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd\">\n",
                self.options.doctype
            ));
        } else {
            out.push_str(&format!(
                "<!DOCTYPE {} PUBLIC \"{}\">\n",
                ts.name("HTML"),
                self.options.doctype
            ));
        }
        out.push_str(&ts.open("HTML"));
        out.push('\n');
        out.push_str(&ts.open("HEAD"));
        out.push('\n');
        out.push_str(&format!(
            "{}{}{}\n",
            ts.open("TITLE"),
            escape_html(&title),
            ts.close("TITLE")
        ));
        if let Some(path) = &self.options.append_head {
            splice_file(&mut out, path);
        }
        let slash = if self.options.xhtml { "/" } else { "" };
        out.push_str(&format!(
            "<{meta} {name}=\"generator\" {content}=\"plainhtml v{version}\"{slash}>\n",
            meta = ts.name("META"),
            name = ts.name("NAME"),
            content = ts.name("CONTENT"),
            version = env!("CARGO_PKG_VERSION"),
        ));
        if let Some(url) = &self.options.style_url {
            out.push_str(&format!(
                "<{link} {rel}=\"stylesheet\" {ty}=\"text/css\" {href}=\"{url}\"{slash}>\n",
                link = ts.name("LINK"),
                rel = ts.name("REL"),
                ty = ts.name("TYPE"),
                href = ts.name("HREF"),
            ));
        }
        out.push_str(&ts.close("HEAD"));
        out.push('\n');
        if self.options.body_deco.trim().is_empty() {
            out.push_str(&ts.open("BODY"));
        } else {
            out.push_str(&format!(
                "<{} {}>",
                ts.name("BODY"),
                self.options.body_deco.trim()
            ));
        }
        out.push('\n');
        out
    }

    fn render_body(&mut self, text: &str) -> String {
        let ts = self.tag_style();
        let mut out = String::new();
        if self.options.preformat_trigger_lines == 0
            && !self.options.link_only
            && !self.state.mode.pre
        {
            out.push_str(&ts.open("PRE"));
            out.push('\n');
            self.state.mode.pre = true;
            self.state.open_tags.push(OpenTag::Pre);
        }

        let ends_with_newline = text.ends_with('\n');
        let split: Vec<&str> = text.split('\n').collect();
        let lines: &[&str] = if text.is_empty() {
            &[]
        } else if ends_with_newline {
            &split[..split.len() - 1]
        } else {
            &split[..]
        };

        let mut para_start = 0usize;
        let mut i = 0usize;
        while i <= lines.len() {
            let at_end = i == lines.len();
            let blank = !at_end && lines[i].trim().is_empty();
            if at_end || blank {
                if i > para_start {
                    let trailing = !at_end || ends_with_newline;
                    let para = self.process_one(&lines[para_start..i], trailing);
                    out.push_str(&para);
                }
                if blank {
                    out.push('\n');
                }
                para_start = i + 1;
            }
            i += 1;
        }
        out
    }

    fn process_one(&mut self, raw_lines: &[&str], trailing_newline: bool) -> String {
        self.memo.clear_section();
        let ts = self.tag_style();
        let mut para = if self.options.link_only {
            let mut joined = raw_lines.join("\n");
            if trailing_newline {
                joined.push('\n');
            }
            joined
        } else {
            analyze::process_paragraph(
                &self.options,
                &self.patterns,
                ts,
                &mut self.state,
                raw_lines,
                trailing_newline,
            )
        };
        if self.options.make_links {
            if let Some(dict) = self.dict.clone() {
                if !dict.is_empty() {
                    para = links::apply_rules(&dict, &mut self.memo, ts, &para);
                }
            }
        }
        if !self.options.eight_bit_clean {
            para = entities::encode_latin1(&para);
        }
        para
    }
}

/// Insert an auxiliary file verbatim; a missing file is reported and the
/// splice skipped.
fn splice_file(out: &mut String, path: &Path) {
    match fs::read_to_string(path) {
        Ok(contents) => out.push_str(&contents),
        Err(err) => log::warn!("cannot read auxiliary file {}: {err}", path.display()),
    }
}
