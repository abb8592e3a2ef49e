//! Named-entity table for the Latin-1 supplement.
//!
//! When `eight_bit_clean` is off, every character in U+00A1..=U+00FF is
//! replaced by its HTML name at emission time. The table is keyed by
//! `codepoint - 0xA1`.

const LATIN1_NAMES: [&str; 95] = [
    "iexcl", "cent", "pound", "curren", "yen", "brvbar", "sect", "uml", "copy", "ordf", "laquo",
    "not", "shy", "reg", "macr", "deg", "plusmn", "sup2", "sup3", "acute", "micro", "para",
    "middot", "cedil", "sup1", "ordm", "raquo", "frac14", "frac12", "frac34", "iquest", "Agrave",
    "Aacute", "Acirc", "Atilde", "Auml", "Aring", "AElig", "Ccedil", "Egrave", "Eacute", "Ecirc",
    "Euml", "Igrave", "Iacute", "Icirc", "Iuml", "ETH", "Ntilde", "Ograve", "Oacute", "Ocirc",
    "Otilde", "Ouml", "times", "Oslash", "Ugrave", "Uacute", "Ucirc", "Uuml", "Yacute", "THORN",
    "szlig", "agrave", "aacute", "acirc", "atilde", "auml", "aring", "aelig", "ccedil", "egrave",
    "eacute", "ecirc", "euml", "igrave", "iacute", "icirc", "iuml", "eth", "ntilde", "ograve",
    "oacute", "ocirc", "otilde", "ouml", "divide", "oslash", "ugrave", "uacute", "ucirc", "uuml",
    "yacute", "thorn", "yuml",
];

pub(crate) fn latin1_entity(ch: char) -> Option<&'static str> {
    let code = ch as u32;
    if (0xA1..=0xFF).contains(&code) {
        Some(LATIN1_NAMES[(code - 0xA1) as usize])
    } else {
        None
    }
}

/// Replace every Latin-1 supplement character with its named entity.
pub(crate) fn encode_latin1(text: &str) -> String {
    if text.chars().all(|ch| (ch as u32) < 0xA1) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match latin1_entity(ch) {
            Some(name) => {
                out.push('&');
                out.push_str(name);
                out.push(';');
            }
            None => out.push(ch),
        }
    }
    out
}
