use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::entities;

static BREAK_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*br\s*/?\s*>").expect("valid regex"));
static PARAGRAPH_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*/?\s*p(?:\s[^>]*)?>").expect("valid regex"));
static LIST_ITEM_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<\s*li(?:\s[^>]*)?>").expect("valid regex"));
static LIST_ITEM_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*/\s*li\s*>").expect("valid regex"));
static ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(?:#(\d{1,7})|#[xX]([0-9A-Fa-f]{1,6})|([a-zA-Z][a-zA-Z0-9]*));").expect("valid regex")
});
static HORIZONTAL_SPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\x0B\x0C\u{00A0}]+").expect("valid regex"));
static SPACE_AROUND_NEWLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\n\s*").expect("valid regex"));

/// Strip markup from a rich-text field, keeping line structure.
///
/// Line-break and paragraph tags become newlines, list items become `- `
/// lines, every other tag is dropped and entities are decoded. Horizontal
/// whitespace collapses to single spaces, blank lines collapse, and the result
/// is trimmed. Absent input yields the empty string.
pub fn clean_rich_text(input: Option<&str>) -> String {
    let text = match input {
        Some(t) if !t.is_empty() => t,
        _ => return String::new(),
    };

    let text = BREAK_TAG.replace_all(text, "\n");
    let text = PARAGRAPH_TAG.replace_all(&text, "\n");
    let text = LIST_ITEM_OPEN.replace_all(&text, "- ");
    let text = LIST_ITEM_CLOSE.replace_all(&text, "\n");
    let text = ANY_TAG.replace_all(&text, "");
    let text = decode_entities(&text);

    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = HORIZONTAL_SPACE.replace_all(&text, " ");
    let text = SPACE_AROUND_NEWLINE.replace_all(&text, "\n");

    text.trim().to_string()
}

/// Decode named (HTML5 list), decimal and hex character references. Unknown
/// names and invalid code points are left untouched.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures| {
            let numeric = if let Some(decimal) = caps.get(1) {
                decimal.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else {
                None
            };
            match (numeric, caps.get(3)) {
                (Some(ch), _) => ch.to_string(),
                (None, Some(name)) => entities::lookup(name.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| caps[0].to_string()),
                (None, None) => caps[0].to_string(),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_empty_input() {
        assert_eq!(clean_rich_text(None), "");
        assert_eq!(clean_rich_text(Some("")), "");
        assert_eq!(clean_rich_text(Some("   \n\t ")), "");
        assert_eq!(clean_rich_text(Some("<p></p><br/>")), "");
    }

    #[test]
    fn test_paragraphs_and_breaks_become_lines() {
        let html = "<p>Called on Monday</p><p>Wants   a <b>quote</b><br>for 20 units</p>";
        assert_eq!(
            clean_rich_text(Some(html)),
            "Called on Monday\nWants a quote\nfor 20 units"
        );
    }

    #[test]
    fn test_list_items() {
        let html = "<ul><li>Tyres</li><li>Oil</li></ul>";
        assert_eq!(clean_rich_text(Some(html)), "- Tyres\n- Oil");
    }

    #[test]
    fn test_entities_decoded() {
        assert_eq!(
            clean_rich_text(Some("Tom&nbsp;&amp;&nbsp;Jerry &#8377;500 &#x41;&lt;")),
            "Tom & Jerry \u{20B9}500 A<"
        );
        assert_eq!(decode_entities("&unknown; &#xFFFFFF;"), "&unknown; &#xFFFFFF;");
    }

    #[test]
    fn test_accented_and_currency_entities() {
        assert_eq!(
            clean_rich_text(Some("Caf&eacute; &euro;5 &times; 2 &frac12;")),
            "Caf\u{E9} \u{20AC}5 \u{D7} 2 \u{BD}"
        );
        assert_eq!(decode_entities("&Uuml;ber &pound;3 &rarr; &hellip;"), "\u{DC}ber \u{A3}3 \u{2192} \u{2026}");
    }

    #[test]
    fn test_tag_attributes_and_case() {
        let html = "<P class=\"x\">One</P><BR />Two<div style=\"a\">Three</div>";
        assert_eq!(clean_rich_text(Some(html)), "One\nTwoThree");
    }

    #[test]
    fn test_crlf_and_blank_lines_collapse() {
        assert_eq!(clean_rich_text(Some("a \r\n\r\n  b\r c")), "a\nb\nc");
    }

    #[test]
    fn test_idempotent_on_cleaned_text() {
        let samples = [
            "<p>Visit <i>after</i> 5pm</p><p>Gate&nbsp;2</p>",
            "plain text",
            "  spaced\t\tout \n\n lines ",
            "<ul><li>a</li><li>b</li></ul>",
        ];
        for sample in samples {
            let once = clean_rich_text(Some(sample));
            assert_eq!(clean_rich_text(Some(&once)), once, "sample: {sample}");
        }
    }
}
