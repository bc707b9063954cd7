//! Markdown-to-plain-text normalization applied before embedding.
//!
//! Embedding models spend capacity on whatever they are given; markup,
//! link targets and code blocks dilute the semantic signal of a note. The
//! passes run in a fixed order so that earlier ones cannot be confused by
//! syntax that later ones remove (for instance, a `***` rule is dropped
//! before emphasis markers are collapsed).

use once_cell::sync::Lazy;
use regex::Regex;

macro_rules! pattern {
    ($name:ident, $re:expr) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($re).expect(stringify!($name)));
    };
}

pattern!(FENCED_CODE, r"(?ms)^[ \t]*(```|~~~).*?^[ \t]*(```|~~~)[^\n]*$");
pattern!(INLINE_CODE, r"`[^`\n]*`");
pattern!(HORIZONTAL_RULE, r"(?m)^[ \t]*([-*_])[ \t]*(?:[-*_][ \t]*){2,}$");
pattern!(HEADING, r"(?m)^[ \t]*#{1,6}[ \t]+");
pattern!(BLOCKQUOTE, r"(?m)^[ \t]*(?:>[ \t]?)+");
pattern!(LIST_MARKER, r"(?m)^[ \t]*(?:[-*+]|\d+[.)])[ \t]+(?:\[[ xX]\][ \t]+)?");
pattern!(IMAGE, r"!\[([^\]]*)\]\([^)]*\)");
pattern!(LINK, r"\[([^\]]*)\]\([^)]*\)");
pattern!(WIKI_LINK, r"!?\[\[(?:[^\]|]*\|)?([^\]]*)\]\]");
pattern!(HTML_TAG, r"</?[A-Za-z][^>]*>");
pattern!(STRONG, r"(\*\*|__)(\S(?:.*?\S)?)(\*\*|__)");
pattern!(STRIKE, r"~~(\S(?:.*?\S)?)~~");
pattern!(EMPHASIS_STAR, r"\*(\S(?:[^*\n]*?\S)?)\*");
pattern!(EMPHASIS_UNDERSCORE, r"\b_(\S(?:[^_\n]*?\S)?)_\b");
pattern!(BLANK_RUN, r"\n[ \t]*(?:\n[ \t]*)+");
pattern!(SPACE_RUN, r"[ \t]+");

/// Reduce Markdown text to the plain prose an embedding model should see.
///
/// Returns an empty string when nothing but markup remains.
///
/// ```rust
/// use vaultsearch_core::preprocess::prepare_for_embedding;
///
/// let text = "## Setup\n\nSee the **[install guide](https://x.io)** and run `make`.";
/// assert_eq!(prepare_for_embedding(text), "Setup\n\nSee the install guide and run .");
/// ```
pub fn prepare_for_embedding(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    let text = FENCED_CODE.replace_all(&text, "");
    let text = INLINE_CODE.replace_all(&text, "");
    let text = HORIZONTAL_RULE.replace_all(&text, "");
    let text = HEADING.replace_all(&text, "");
    let text = BLOCKQUOTE.replace_all(&text, "");
    let text = LIST_MARKER.replace_all(&text, "");
    let text = IMAGE.replace_all(&text, "$1");
    let text = LINK.replace_all(&text, "$1");
    let text = WIKI_LINK.replace_all(&text, "$1");
    let text = HTML_TAG.replace_all(&text, "");
    let text = STRONG.replace_all(&text, "$2");
    let text = STRIKE.replace_all(&text, "$1");
    let text = EMPHASIS_STAR.replace_all(&text, "$1");
    let text = EMPHASIS_UNDERSCORE.replace_all(&text, "$1");
    let text = SPACE_RUN.replace_all(&text, " ");
    let text = BLANK_RUN.replace_all(&text, "\n\n");

    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
