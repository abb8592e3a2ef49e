use plainhtml_core::{Options, TextToHtml};

fn tables_on() -> Options {
    Options {
        make_tables: true,
        ..Options::default()
    }
}

#[test]
fn aligned_rows_become_a_left_aligned_table() {
    let mut conv = TextToHtml::new(tables_on());
    let html = conv.convert_fragment(
        "-e  File exists.\n-z  File has zero size.\n-s  File has nonzero size (returns size).\n",
        true,
    );
    assert_eq!(
        html,
        "<TABLE>\n\
         <TR><TD ALIGN=\"LEFT\">-e</TD><TD ALIGN=\"LEFT\">File exists.</TD></TR>\n\
         <TR><TD ALIGN=\"LEFT\">-z</TD><TD ALIGN=\"LEFT\">File has zero size.</TD></TR>\n\
         <TR><TD ALIGN=\"LEFT\">-s</TD><TD ALIGN=\"LEFT\">File has nonzero size (returns size).</TD></TR>\n\
         </TABLE>\n"
    );
}

#[test]
fn right_aligned_numbers_vote_right() {
    let mut conv = TextToHtml::new(tables_on());
    let html = conv.convert_fragment("  1  alpha\n 10  bravo\n100  charlie\n", true);
    assert!(html.contains("<TD ALIGN=\"RIGHT\">1</TD>"));
    assert!(html.contains("<TD ALIGN=\"RIGHT\">100</TD>"));
    assert!(html.contains("<TD ALIGN=\"LEFT\">charlie</TD>"));
}

#[test]
fn centered_cells_vote_center() {
    let mut conv = TextToHtml::new(tables_on());
    let html = conv.convert_fragment("x   aa   x\nx  bbbb  x\nx   cc   x\n", true);
    assert!(html.contains("<TD ALIGN=\"CENTER\">aa</TD>"));
    assert!(html.contains("<TD ALIGN=\"CENTER\">bbbb</TD>"));
}

#[test]
fn single_row_is_not_a_table() {
    let mut conv = TextToHtml::new(tables_on());
    let html = conv.convert_fragment("-e  File exists.\n", true);
    assert!(!html.contains("<TABLE>"));
}

#[test]
fn single_column_is_not_a_table() {
    let mut conv = TextToHtml::new(tables_on());
    let html = conv.convert_fragment(
        "a first plain line without gutters\nand a second plain line too\n",
        true,
    );
    assert!(!html.contains("<TABLE>"));
}

#[test]
fn tables_disabled_means_no_table_tags() {
    let mut conv = TextToHtml::new(Options::default());
    let html = conv.convert_fragment(
        "-e  File exists.\n-z  File has zero size.\n-s  File has nonzero size (returns size).\n",
        true,
    );
    assert!(!html.contains("<TABLE"));
}

#[test]
fn cells_are_escaped() {
    let mut conv = TextToHtml::new(tables_on());
    let html = conv.convert_fragment("a<b  one & two\nc>d  three < four\n", true);
    assert!(html.contains("<TD ALIGN=\"LEFT\">a&lt;b</TD>"));
    assert!(html.contains("one &amp; two"));
    assert!(html.contains("three &lt; four"));
}

#[test]
fn rendered_tables_do_not_detect_again() {
    let mut conv = TextToHtml::new(tables_on());
    let first = conv.convert_fragment(
        "-e  File exists.\n-z  File has zero size.\n-s  File has nonzero size (returns size).\n",
        true,
    );
    let mut again = TextToHtml::new(Options {
        make_tables: true,
        escape_html_chars: false,
        make_links: false,
        ..Options::default()
    });
    let second = again.convert_fragment(&first, true);
    assert_eq!(second.matches("<TABLE>").count(), 1);
    assert_eq!(second.matches("</TABLE>").count(), 1);
}

#[test]
fn open_preformat_suppresses_table_detection() {
    let mut conv = TextToHtml::new(Options {
        make_tables: true,
        preformat_trigger_lines: 1,
        ..Options::default()
    });
    let html = conv.convert_fragment(
        "keep      aligned\n\n-e  File exists.\n-z  File has zero size.\n",
        true,
    );
    assert!(html.starts_with("<PRE>"));
    // The second paragraph begins while preformat is still open, so it is
    // not considered for a table even though it ends the region.
    assert!(!html.contains("<TABLE"));
    assert!(html.contains("</PRE>\n"));
}
