use regex::Regex;
use std::sync::LazyLock;

static NON_PRINTABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^\x09\x0A\x0D\x20-\x7E\x{00A0}-\x{FFFF}]").expect("static pattern")
});
static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("static pattern"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n+").expect("static pattern"));
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+([.,;:!?])").expect("static pattern"));

/// Normalizes raw extracted text before chunking: drops characters outside
/// the printable whitelist, collapses space/tab runs to one space, collapses
/// runs of blank lines to a single blank line, removes whitespace before
/// closing punctuation, and trims the ends. Total and idempotent.
pub fn clean_text(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let text = NON_PRINTABLE.replace_all(raw, "");
    let text = SPACE_RUNS.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::clean_text;

    #[test]
    fn space_runs_collapse_to_one() {
        assert_eq!(clean_text("A  \t  lot\tof   spacing"), "A lot of spacing");
    }

    #[test]
    fn blank_line_runs_collapse_to_one_blank_line() {
        assert_eq!(clean_text("first\n\n\n\nsecond"), "first\n\nsecond");
        assert_eq!(clean_text("first\n   \n\t\nsecond"), "first\n\nsecond");
    }

    #[test]
    fn whitespace_before_punctuation_is_removed() {
        assert_eq!(
            clean_text("Hello , world . How are you ?"),
            "Hello, world. How are you?"
        );
    }

    #[test]
    fn non_printable_characters_are_dropped() {
        assert_eq!(clean_text("ab\u{0000}cd\u{0007}ef"), "abcdef");
        // The BMP whitelist keeps accented text but drops astral symbols.
        assert_eq!(clean_text("caf\u{00E9} \u{1F600}ok"), "caf\u{00E9} ok");
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("   \n \t "), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "A  b\tc ,  d .\n\n\n\ne",
            "  leading and trailing  ",
            "already clean text.",
            "mixed\u{0001} control \u{00A0}chars !",
        ];
        for input in inputs {
            let once = clean_text(input);
            assert_eq!(clean_text(&once), once, "not idempotent for {input:?}");
        }
    }
}
