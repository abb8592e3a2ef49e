use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use plainhtml_core::{LinkDictionary, Options, TextToHtml};

const CASES: usize = 150;
const MAX_LEN: usize = 400;
const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 \
\n\t*-=.~+o>|:#&<\"'()[]_@/";

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    fn gen_range(&mut self, low: usize, high: usize) -> usize {
        low + (self.next_u64() as usize) % (high - low)
    }
}

fn random_string(rng: &mut Lcg, len: usize) -> String {
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        let idx = rng.gen_range(0, CHARSET.len());
        out.push(CHARSET[idx] as char);
    }
    out
}

fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

#[test]
fn converter_never_panics_on_random_input() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x5eed_0001_c0de_aaaa);
    for case in 0..CASES {
        let len = rng.gen_range(0, MAX_LEN + 1);
        let source = random_string(&mut rng, len);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut conv = TextToHtml::new(Options {
                make_tables: true,
                mailmode: true,
                ..Options::default()
            });
            conv.convert_fragment(&source, true)
        }));
        if result.is_err() {
            return Err(format!("conversion panicked for case {}: {:?}", case, source).into());
        }
    }
    Ok(())
}

#[test]
fn fragment_close_balances_structural_tags() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x5eed_0002_0b57_ac1e);
    for case in 0..CASES {
        let len = rng.gen_range(0, MAX_LEN + 1);
        let source = random_string(&mut rng, len);
        let mut conv = TextToHtml::new(Options {
            make_tables: true,
            ..Options::default()
        });
        let html = conv.convert_fragment(&source, true);
        for tag in ["UL", "OL", "PRE", "TABLE", "H1", "H2", "H3", "H4", "H5", "H6"] {
            let opens = count(&html, &format!("<{tag}>"));
            let closes = count(&html, &format!("</{tag}>"));
            if opens != closes {
                return Err(format!(
                    "unbalanced {tag} for case {case}: {opens} opens vs {closes} closes\n\
                     Source:\n---\n{source}\n---\nOutput:\n---\n{html}\n---"
                )
                .into());
            }
        }
    }
    Ok(())
}

#[test]
fn xhtml_documents_balance_paragraphs_too() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x5eed_0003_dead_bee5);
    for case in 0..CASES {
        let len = rng.gen_range(0, MAX_LEN + 1);
        let source = random_string(&mut rng, len);
        let mut conv = TextToHtml::new(Options {
            xhtml: true,
            extract: true,
            ..Options::default()
        });
        let mut out = Vec::new();
        conv.convert_document(&mut [std::io::Cursor::new(source.clone())], &mut out)?;
        let html = String::from_utf8(out)?;
        for tag in ["p", "ul", "ol", "pre", "li"] {
            let opens = count(&html, &format!("<{tag}>"));
            let closes = count(&html, &format!("</{tag}>"));
            if opens != closes {
                return Err(format!(
                    "unbalanced {tag} for case {case}: {opens} opens vs {closes} closes\n\
                     Source:\n---\n{source}\n---\nOutput:\n---\n{html}\n---"
                )
                .into());
            }
        }
    }
    Ok(())
}

#[test]
fn once_rules_never_fire_twice_per_document() -> Result<(), Box<dyn std::error::Error>> {
    let dict = LinkDictionary::parse("t", "zebra -o-> http://zebra/\n")?;
    let mut rng = Lcg::new(0x5eed_0004_ab1e_5eed);
    for _ in 0..CASES {
        let len = rng.gen_range(0, 200);
        let mut source = random_string(&mut rng, len);
        // Plant the keyword a few times at random-ish offsets.
        source.push_str(" zebra ");
        source.push_str(&random_string(&mut rng, 40));
        source.push_str("\n\nzebra again, zebra\n");
        let mut conv = TextToHtml::new(Options {
            link_only: true,
            ..Options::default()
        });
        conv.set_dictionary(Arc::new(dict.clone()));
        let html = conv.convert_fragment(&source, true);
        assert!(count(&html, "<A HREF=\"http://zebra/\">") <= 1);
    }
    Ok(())
}

#[test]
fn no_table_tags_when_tables_are_off() -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = Lcg::new(0x5eed_0005_0ff1_ab1e);
    for _ in 0..CASES {
        let len = rng.gen_range(0, MAX_LEN + 1);
        let source = random_string(&mut rng, len);
        let mut conv = TextToHtml::new(Options::default());
        let html = conv.convert_fragment(&source, true);
        assert!(!html.contains("<TABLE"));
    }
    Ok(())
}
