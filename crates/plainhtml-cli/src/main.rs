//! Command-line front end for the plain-text to HTML converter.
//!
//! Usage:
//!   plainhtml [OPTIONS] [FILE]...      - convert files (stdin if none)
//!   plainhtml --extract notes.txt      - emit body content only
//!   plainhtml --dict extra.dict in.txt - add a link dictionary

use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::path::PathBuf;
use std::process;

use clap::{Arg, ArgAction, Command};

use plainhtml_core::{Options, TextToHtml};

fn main() {
    env_logger::init();

    let matches = Command::new("plainhtml")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Convert plain text to HTML by inferring structure from layout")
        .arg(
            Arg::new("infile")
                .help("Input files, converted in order (stdin if none)")
                .num_args(0..)
                .index(1),
        )
        .arg(
            Arg::new("outfile")
                .long("outfile")
                .short('o')
                .help("Output file ('-' for stdout)")
                .default_value("-"),
        )
        .arg(
            Arg::new("title")
                .long("title")
                .short('t')
                .help("Document title"),
        )
        .arg(
            Arg::new("titlefirst")
                .long("titlefirst")
                .help("Take the title from the first non-blank line")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("mail")
                .long("mail")
                .short('m')
                .help("Expect mail headers and quoted text")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tables")
                .long("tables")
                .help("Detect whitespace-aligned tables")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("xhtml")
                .long("xhtml")
                .help("Emit XHTML (implies lowercase tags)")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("extract")
                .long("extract")
                .help("Emit body content only, no document envelope")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("link-only")
                .long("link-only")
                .help("Skip structural analysis, only apply link dictionaries")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("lower-case-tags")
                .long("lower-case-tags")
                .help("Emit lowercase tag names")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-links")
                .long("no-links")
                .help("Do not apply link dictionaries")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-anchors")
                .long("no-anchors")
                .help("Do not place section or message anchors")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("dict")
                .long("dict")
                .help("Additional link dictionary file (repeatable)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("system-dict")
                .long("system-dict")
                .help("Replace the built-in standard dictionary"),
        )
        .arg(
            Arg::new("personal-dict")
                .long("personal-dict")
                .help("Personal dictionary loaded after the system one"),
        )
        .arg(
            Arg::new("prepend-file")
                .long("prepend-file")
                .help("File spliced verbatim after <BODY>"),
        )
        .arg(
            Arg::new("append-file")
                .long("append-file")
                .help("File spliced verbatim before </BODY>"),
        )
        .arg(
            Arg::new("append-head")
                .long("append-head")
                .help("File spliced verbatim into <HEAD>"),
        )
        .arg(
            Arg::new("style-url")
                .long("style-url")
                .help("Stylesheet URL for a <LINK> in the head"),
        )
        .arg(
            Arg::new("body-deco")
                .long("body-deco")
                .help("Attribute string for the <BODY> tag"),
        )
        .arg(
            Arg::new("doctype")
                .long("doctype")
                .help("Public identifier for the doctype declaration"),
        )
        .arg(
            Arg::new("caps-tag")
                .long("caps-tag")
                .help("Tag wrapped around all-caps lines [default: STRONG]"),
        )
        .arg(
            Arg::new("heading-regexp")
                .long("heading-regexp")
                .help("Custom heading pattern (repeatable, in level order)")
                .action(ArgAction::Append),
        )
        .arg(
            Arg::new("explicit-headings")
                .long("explicit-headings")
                .help("Heading patterns map to fixed levels by position")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("mosaic-headers")
                .long("mosaic-headers")
                .help("Use the Mosaic underline convention for levels")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("preserve-indent")
                .long("preserve-indent")
                .help("Keep paragraph indentation as non-breaking spaces")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("indent-par-break")
                .long("indent-par-break")
                .help("Treat indent jumps as line breaks, not new paragraphs")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("preformat-marker")
                .long("preformat-marker")
                .help("Honor literal <pre>/</pre> markers in the input")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("eight-bit-clean")
                .long("eight-bit-clean")
                .help("Pass Latin-1 characters through instead of entities")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-escape")
                .long("no-escape")
                .help("Do not escape &, < and >")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("no-unhyphenation")
                .long("no-unhyphenation")
                .help("Leave hyphenated line breaks alone")
                .action(ArgAction::SetTrue),
        )
        .arg(numeric_arg(
            "short-line-length",
            "Lines shorter than this keep their break [default: 40]",
        ))
        .arg(numeric_arg(
            "par-indent",
            "Indent jump that starts a new paragraph [default: 2]",
        ))
        .arg(numeric_arg(
            "hrule-min",
            "Minimum rule-character run for a horizontal rule [default: 4]",
        ))
        .arg(numeric_arg(
            "min-caps-length",
            "Minimum run of capitals for an all-caps line [default: 3]",
        ))
        .arg(numeric_arg("tab-width", "Tab stop width [default: 8]"))
        .arg(numeric_arg(
            "indent-width",
            "Output indentation per list level [default: 2]",
        ))
        .arg(numeric_arg(
            "preformat-whitespace-min",
            "Minimum space/dot run that looks preformatted [default: 5]",
        ))
        .arg(numeric_arg(
            "preformat-trigger-lines",
            "Preformat-looking lines needed to open a region, 0..2 [default: 2]",
        ))
        .arg(numeric_arg(
            "endpreformat-trigger-lines",
            "Plain lines needed to close a region, 0..2 [default: 2]",
        ))
        .arg(numeric_arg(
            "underline-length-tolerance",
            "Allowed length mismatch for heading underlines [default: 1]",
        ))
        .arg(numeric_arg(
            "underline-offset-tolerance",
            "Allowed indent mismatch for heading underlines [default: 1]",
        ))
        .get_matches();

    let defaults = Options::default();
    let options = Options {
        title: matches.get_one::<String>("title").cloned(),
        titlefirst: matches.get_flag("titlefirst"),
        mailmode: matches.get_flag("mail"),
        make_tables: matches.get_flag("tables"),
        xhtml: matches.get_flag("xhtml"),
        extract: matches.get_flag("extract"),
        link_only: matches.get_flag("link-only"),
        lower_case_tags: matches.get_flag("lower-case-tags"),
        make_links: !matches.get_flag("no-links"),
        make_anchors: !matches.get_flag("no-anchors"),
        links_dictionaries: paths(&matches, "dict"),
        system_link_dict: path(&matches, "system-dict"),
        default_link_dict: path(&matches, "personal-dict"),
        prepend_file: path(&matches, "prepend-file"),
        append_file: path(&matches, "append-file"),
        append_head: path(&matches, "append-head"),
        style_url: matches.get_one::<String>("style-url").cloned(),
        body_deco: matches
            .get_one::<String>("body-deco")
            .cloned()
            .unwrap_or_default(),
        doctype: matches
            .get_one::<String>("doctype")
            .cloned()
            .unwrap_or_else(|| defaults.doctype.clone()),
        caps_tag: matches
            .get_one::<String>("caps-tag")
            .cloned()
            .unwrap_or_else(|| defaults.caps_tag.clone()),
        custom_heading_regexp: matches
            .get_many::<String>("heading-regexp")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        explicit_headings: matches.get_flag("explicit-headings"),
        use_mosaic_header: matches.get_flag("mosaic-headers"),
        preserve_indent: matches.get_flag("preserve-indent"),
        indent_par_break: matches.get_flag("indent-par-break"),
        use_preformat_marker: matches.get_flag("preformat-marker"),
        eight_bit_clean: matches.get_flag("eight-bit-clean"),
        escape_html_chars: !matches.get_flag("no-escape"),
        unhyphenation: !matches.get_flag("no-unhyphenation"),
        short_line_length: number(&matches, "short-line-length", defaults.short_line_length),
        par_indent: number(&matches, "par-indent", defaults.par_indent),
        hrule_min: number(&matches, "hrule-min", defaults.hrule_min),
        min_caps_length: number(&matches, "min-caps-length", defaults.min_caps_length),
        tab_width: number(&matches, "tab-width", defaults.tab_width),
        indent_width: number(&matches, "indent-width", defaults.indent_width),
        preformat_whitespace_min: number(
            &matches,
            "preformat-whitespace-min",
            defaults.preformat_whitespace_min,
        ),
        preformat_trigger_lines: number(
            &matches,
            "preformat-trigger-lines",
            defaults.preformat_trigger_lines,
        ),
        endpreformat_trigger_lines: number(
            &matches,
            "endpreformat-trigger-lines",
            defaults.endpreformat_trigger_lines,
        ),
        underline_length_tolerance: number(
            &matches,
            "underline-length-tolerance",
            defaults.underline_length_tolerance,
        ),
        underline_offset_tolerance: number(
            &matches,
            "underline-offset-tolerance",
            defaults.underline_offset_tolerance,
        ),
        infile: paths(&matches, "infile"),
        outfile: matches
            .get_one::<String>("outfile")
            .cloned()
            .unwrap_or_else(|| "-".to_string()),
        ..defaults
    };

    if let Err(err) = run(options) {
        eprintln!("plainhtml: {err}");
        process::exit(1);
    }
}

fn numeric_arg(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).value_name("N").help(help)
}

fn path(matches: &clap::ArgMatches, name: &str) -> Option<PathBuf> {
    matches.get_one::<String>(name).map(PathBuf::from)
}

fn paths(matches: &clap::ArgMatches, name: &str) -> Vec<PathBuf> {
    matches
        .get_many::<String>(name)
        .map(|values| values.map(PathBuf::from).collect())
        .unwrap_or_default()
}

fn number(matches: &clap::ArgMatches, name: &str, default: usize) -> usize {
    match matches.get_one::<String>(name) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            eprintln!("plainhtml: --{name} expects a number, got {raw:?}");
            process::exit(2);
        }),
        None => default,
    }
}

fn run(options: Options) -> plainhtml_core::Result<()> {
    let infiles = options.infile.clone();
    let outfile = options.outfile.clone();
    let mut converter = TextToHtml::new(options);

    let mut output: Box<dyn Write> = if outfile == "-" {
        Box::new(io::stdout().lock())
    } else {
        Box::new(File::create(&outfile)?)
    };

    if infiles.is_empty() {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        converter.convert_document(&mut [Cursor::new(source)], &mut output)?;
    } else {
        converter.convert_files(&infiles, &mut output)?;
    }
    output.flush()?;
    Ok(())
}
