use std::env;
use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use plainhtml_core::{Options, TextToHtml};

fn temp_file(name: &str, contents: &str) -> PathBuf {
    let mut path = env::temp_dir();
    let now = SystemTime::now().duration_since(UNIX_EPOCH).expect("time");
    path.push(format!(
        "plainhtml_doc_{}_{}_{}.txt",
        name,
        now.as_secs(),
        now.subsec_nanos()
    ));
    fs::write(&path, contents).expect("write temp file");
    path
}

fn convert(opts: Options, input: &str) -> String {
    let mut conv = TextToHtml::new(opts);
    let mut out = Vec::new();
    conv.convert_document(&mut [Cursor::new(input)], &mut out)
        .expect("conversion");
    String::from_utf8(out).expect("utf-8 output")
}

#[test]
fn envelope_has_doctype_head_and_body() {
    let html = convert(
        Options::default(),
        "A plain paragraph of text that is long enough.\n",
    );
    assert!(html.starts_with(
        "<!DOCTYPE HTML PUBLIC \"-//W3C//DTD HTML 3.2 Final//EN\">\n<HTML>\n<HEAD>\n<TITLE></TITLE>\n"
    ));
    assert!(html.contains("<META NAME=\"generator\" CONTENT=\"plainhtml v"));
    assert!(html.contains("<BODY>\n<P>A plain paragraph of text that is long enough.\n"));
    assert!(html.ends_with("</BODY>\n</HTML>\n"));
}

#[test]
fn title_option_and_titlefirst() {
    let html = convert(
        Options {
            title: Some("My Title".to_string()),
            ..Options::default()
        },
        "body text goes here and is long enough to stand.\n",
    );
    assert!(html.contains("<TITLE>My Title</TITLE>"));

    let html = convert(
        Options {
            titlefirst: true,
            ..Options::default()
        },
        "First Line Wins\n\nbody text goes here and is long enough to stand.\n",
    );
    assert!(html.contains("<TITLE>First Line Wins</TITLE>"));
}

#[test]
fn xhtml_document_is_lowercase_and_closed() {
    let html = convert(
        Options {
            xhtml: true,
            ..Options::default()
        },
        "A paragraph long enough that nothing shortens or breaks it.\n",
    );
    assert!(html.starts_with(
        "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.0 Transitional//EN\""
    ));
    assert!(html.contains("<body>\n<p>"));
    assert!(html.contains("</p>"));
    assert!(html.ends_with("</body>\n</html>\n"));
}

#[test]
fn extract_emits_body_content_only() {
    let html = convert(
        Options {
            extract: true,
            ..Options::default()
        },
        "Only the body content should come out of this run.\n",
    );
    assert_eq!(html, "<P>Only the body content should come out of this run.\n");
}

#[test]
fn style_url_and_body_deco() {
    let html = convert(
        Options {
            style_url: Some("site.css".to_string()),
            body_deco: "BGCOLOR=\"#ffffff\"".to_string(),
            ..Options::default()
        },
        "text body that is long enough to avoid any breaks.\n",
    );
    assert!(html.contains(
        "<LINK REL=\"stylesheet\" TYPE=\"text/css\" HREF=\"site.css\">"
    ));
    assert!(html.contains("<BODY BGCOLOR=\"#ffffff\">"));
}

#[test]
fn splice_files_are_inserted_verbatim() {
    let head = temp_file("head", "<!-- head splice -->\n");
    let pre = temp_file("pre", "<!-- prepend splice -->\n");
    let post = temp_file("post", "<!-- append splice -->\n");
    let html = convert(
        Options {
            append_head: Some(head.clone()),
            prepend_file: Some(pre.clone()),
            append_file: Some(post.clone()),
            ..Options::default()
        },
        "the document body sits between the two splices here.\n",
    );
    let head_at = html.find("<!-- head splice -->").expect("head splice");
    let pre_at = html.find("<!-- prepend splice -->").expect("prepend splice");
    let body_at = html.find("<P>the document body").expect("body");
    let post_at = html.find("<!-- append splice -->").expect("append splice");
    assert!(head_at < pre_at && pre_at < body_at && body_at < post_at);
    let _ = fs::remove_file(head);
    let _ = fs::remove_file(pre);
    let _ = fs::remove_file(post);
}

#[test]
fn missing_splice_files_are_skipped() {
    let html = convert(
        Options {
            prepend_file: Some(PathBuf::from("/nonexistent/prepend.html")),
            append_file: Some(PathBuf::from("/nonexistent/append.html")),
            ..Options::default()
        },
        "content that still converts when the splices are gone.\n",
    );
    assert!(html.contains("<P>content that still converts"));
}

#[test]
fn latin1_characters_become_named_entities() {
    let html = convert(
        Options::default(),
        "The caf\u{E9} on the corner serves excellent coffee.\n",
    );
    assert!(html.contains("caf&eacute; on the corner"));

    let html = convert(
        Options {
            eight_bit_clean: true,
            ..Options::default()
        },
        "The caf\u{E9} on the corner serves excellent coffee.\n",
    );
    assert!(html.contains("caf\u{E9} on the corner"));
}

#[test]
fn preformat_region_spans_paragraphs_and_closes() {
    let html = convert(
        Options::default(),
        "name        value\nalpha       one\n\nBack to plain prose which is not aligned at all.\n",
    );
    assert!(html.contains("<PRE>\nname        value\nalpha       one\n"));
    assert!(html.contains("</PRE>\n<P>Back to plain prose"));
}

#[test]
fn whole_document_preformat() {
    let html = convert(
        Options {
            preformat_trigger_lines: 0,
            ..Options::default()
        },
        "anything at all\n",
    );
    assert!(html.contains("<PRE>\nanything at all\n</PRE>\n"));
}

#[test]
fn link_only_skips_structural_analysis() {
    let html = convert(
        Options {
            link_only: true,
            ..Options::default()
        },
        "plain text with http://example.org/path inside it\n",
    );
    assert!(!html.contains("<P>"));
    assert!(html.contains(
        "plain text with <A HREF=\"http://example.org/path\">http://example.org/path</A> inside it"
    ));
}

#[test]
fn mailmode_marks_messages_quotes_and_headers() {
    let html = convert(
        Options {
            mailmode: true,
            ..Options::default()
        },
        "From: alice@example.org\nSubject: Hi there\n\n> quoted reply line here\nfresh text follows the quote\n",
    );
    assert!(html.contains("<!-- New Message -->"));
    assert!(html.contains("<A NAME=\"mail1\">From: alice@example.org</A><BR>"));
    assert!(html.contains("Subject: Hi there<BR>"));
    assert!(html.contains("&gt; quoted reply line here<BR>"));
}

#[test]
fn unreadable_inputs_leave_an_empty_body() {
    let mut conv = TextToHtml::new(Options::default());
    let mut out = Vec::new();
    conv.convert_files(&[PathBuf::from("/nonexistent/input.txt")], &mut out)
        .expect("conversion survives missing input");
    let html = String::from_utf8(out).expect("utf-8 output");
    assert!(html.contains("<BODY>\n</BODY>"));
}

#[test]
fn multiple_inputs_concatenate() {
    let first = temp_file("first", "Opening paragraph from the first file, long enough.\n");
    let second = temp_file("second", "\nSecond paragraph from the second file, long enough.\n");
    let mut conv = TextToHtml::new(Options::default());
    let mut out = Vec::new();
    conv.convert_files(&[first.clone(), second.clone()], &mut out)
        .expect("conversion");
    let html = String::from_utf8(out).expect("utf-8 output");
    assert!(html.contains("<P>Opening paragraph from the first file"));
    assert!(html.contains("<P>Second paragraph from the second file"));
    let _ = fs::remove_file(first);
    let _ = fs::remove_file(second);
}

#[test]
fn set_options_switches_modes_between_documents() {
    let mut conv = TextToHtml::new(Options::default());
    let mut out = Vec::new();
    conv.convert_document(
        &mut [Cursor::new("one paragraph that is long enough to be left alone.\n")],
        &mut out,
    )
    .expect("first conversion");
    assert!(String::from_utf8_lossy(&out).contains("<P>"));

    conv.set_options(Options {
        xhtml: true,
        ..Options::default()
    });
    let mut out = Vec::new();
    conv.convert_document(
        &mut [Cursor::new("one paragraph that is long enough to be left alone.\n")],
        &mut out,
    )
    .expect("second conversion");
    let html = String::from_utf8(out).expect("utf-8 output");
    assert!(html.contains("<p>"));
    assert!(html.ends_with("</body>\n</html>\n"));
}
