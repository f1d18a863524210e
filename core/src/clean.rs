use lazy_static::lazy_static;
use std::collections::HashMap;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub const MIN_REPORT_CHARS: usize = 50;
pub const MAX_REPORT_CHARS: usize = 5000;

lazy_static! {
    // Characters that survive NFKD decomposition but have a plain ASCII spelling.
    static ref ASCII_SPELLINGS: HashMap<char, &'static str> = {
        let pairs: &[(char, &str)] = &[
            ('\u{2018}', "'"), ('\u{2019}', "'"), ('\u{201A}', "'"), ('\u{201B}', "'"), ('\u{2032}', "'"),
            ('\u{201C}', "\""), ('\u{201D}', "\""), ('\u{201E}', "\""), ('\u{201F}', "\""), ('\u{2033}', "\""),
            ('\u{00AB}', "<<"), ('\u{00BB}', ">>"), ('\u{2039}', "<"), ('\u{203A}', ">"),
            ('\u{2010}', "-"), ('\u{2011}', "-"), ('\u{2012}', "-"), ('\u{2013}', "-"), ('\u{2014}', "--"), ('\u{2015}', "--"),
            ('\u{2022}', "*"), ('\u{00B7}', "*"), ('\u{00D7}', "x"), ('\u{00F7}', "/"),
            ('\u{00DF}', "ss"), ('\u{00E6}', "ae"), ('\u{00C6}', "AE"), ('\u{0153}', "oe"), ('\u{0152}', "OE"),
            ('\u{00F8}', "o"), ('\u{00D8}', "O"), ('\u{0142}', "l"), ('\u{0141}', "L"), ('\u{0111}', "d"), ('\u{0110}', "D"),
            ('\u{20AC}', "EUR"), ('\u{00A3}', "PS"), ('\u{00A9}', "(c)"), ('\u{00AE}', "(r)"), ('\u{00B0}', "deg"),
            ('\u{2026}', "..."), ('\u{00A0}', " "), ('\u{3000}', " "),
        ];
        pairs.iter().copied().collect()
    };
}

/// Closest ASCII rendition of `text`; characters without one are dropped.
pub fn to_ascii(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.nfkd() {
        if c.is_ascii() {
            out.push(c);
        } else if is_combining_mark(c) {
            continue;
        } else if let Some(spelling) = ASCII_SPELLINGS.get(&c) {
            out.push_str(spelling);
        }
    }
    out
}

/// ASCII-fold a report, turn double quotes into single quotes, and trim it.
pub fn clean_text(text: &str) -> String {
    to_ascii(text).replace('"', "'").trim().to_string()
}

/// True for reports between 50 and 5000 characters, inclusive.
pub fn within_length(text: &str) -> bool {
    let n = text.chars().count();
    (MIN_REPORT_CHARS..=MAX_REPORT_CHARS).contains(&n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_accents_and_quotes() {
        let cleaned = clean_text("  Caf\u{00E9} \u{201C}na\u{00EF}ve\u{201D} dream\u{2014}so real  ");
        assert_eq!(cleaned, "Cafe 'naive' dream--so real");
    }

    #[test]
    fn drops_unmapped_characters() {
        assert_eq!(to_ascii("fly \u{1F54A} high"), "fly  high");
        assert_eq!(to_ascii("\u{FB01}eld"), "field");
    }

    #[test]
    fn length_bounds_are_inclusive() {
        assert!(!within_length(&"a".repeat(49)));
        assert!(within_length(&"a".repeat(50)));
        assert!(within_length(&"a".repeat(5000)));
        assert!(!within_length(&"a".repeat(5001)));
    }
}
