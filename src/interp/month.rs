use bitflags::bitflags;

use crate::util::chars_eq_ignore_case;

bitflags! {
    /// Languages whose month names a listing may use.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Languages: u8 {
        const ENGLISH = 1;
        const GERMAN = 1 << 1;
        const NORWEGIAN = 1 << 2;
        const SWEDISH = 1 << 3;
    }
}

impl Default for Languages {
    fn default() -> Self {
        Languages::all()
    }
}

const E: Languages = Languages::ENGLISH;
const G: Languages = Languages::GERMAN;
const N: Languages = Languages::NORWEGIAN;
const S: Languages = Languages::SWEDISH;

// english: jan feb mar apr may jun jul aug sep oct nov dec
// german:  jan feb mär apr mai jun jul aug sep okt nov dez
// norwegian: jan feb mar apr mai jun jul aug sep okt nov des
// swedish: jan feb mar apr maj jun jul aug sep okt nov dec
const THREE_LETTER: [(&str, u32, Languages); 18] = [
    ("jan", 1, E.union(G).union(N).union(S)),
    ("feb", 2, E.union(G).union(N).union(S)),
    ("mar", 3, E.union(N).union(S)),
    ("apr", 4, E.union(G).union(N).union(S)),
    ("may", 5, E),
    ("jun", 6, E.union(G).union(N).union(S)),
    ("jul", 7, E.union(G).union(N).union(S)),
    ("aug", 8, E.union(G).union(N).union(S)),
    ("sep", 9, E.union(G).union(N).union(S)),
    ("oct", 10, E),
    ("nov", 11, E.union(G).union(N).union(S)),
    ("dec", 12, E.union(S)),
    ("mär", 3, G),
    ("mai", 5, G.union(N)),
    ("okt", 10, G.union(N).union(S)),
    ("dez", 12, G),
    ("des", 12, N),
    ("maj", 5, S),
];

const TEXTUAL: [(&str, u32, Languages); 12] = [
    ("Jan.", 1, G),
    ("Feb.", 2, G),
    ("März", 3, G),
    ("Apr.", 4, G),
    ("Mai", 5, G),
    ("Juni", 6, G),
    ("Juli", 7, G),
    ("Aug.", 8, G),
    ("Sept.", 9, G),
    ("Okt.", 10, G),
    ("Nov.", 11, G),
    ("Dez.", 12, G),
];

/// Byte length of `prefix` inside `text` when `text` starts with it, ignoring case.
fn strip_prefix_ignore_case(text: &str, prefix: &str) -> Option<usize> {
    let mut chars = text.char_indices();
    for p in prefix.chars() {
        match chars.next() {
            Some((_, c)) if chars_eq_ignore_case(c, p) => {}
            _ => return None,
        }
    }
    Some(chars.next().map_or(text.len(), |(i, _)| i))
}

/// Month number of a three-letter name from a caller-supplied, space-separated list.
pub(crate) fn three_letter_from_list(name: &str, list: &str) -> Option<u32> {
    list.split(|c: char| c <= ' ')
        .take(12)
        .position(|m| strip_prefix_ignore_case(name, m) == Some(name.len()))
        .map(|i| i as u32 + 1)
}

/// Month number of a three-letter name in any language still allowed by `languages`.
/// A match narrows `languages` to the languages spelling the month that way.
pub(crate) fn three_letter_any_language(name: &str, languages: &mut Languages) -> Option<u32> {
    let (_, month, spelled_in) = THREE_LETTER
        .iter()
        .find(|(m, _, _)| strip_prefix_ignore_case(name, m) == Some(name.len()))?;
    if !languages.intersects(*spelled_in) {
        return None;
    }
    *languages &= *spelled_in;
    Some(*month)
}

/// Month at the start of `word` from a list of twelve space-separated names.
/// Returns the month and the byte length consumed.
pub(crate) fn textual_from_list(word: &str, list: &str) -> Option<(u32, usize)> {
    list.split(' ')
        .take(12)
        .enumerate()
        .find_map(|(i, m)| strip_prefix_ignore_case(word, m).map(|len| (i as u32 + 1, len)))
}

pub(crate) fn textual_any_language(word: &str, languages: &mut Languages) -> Option<(u32, usize)> {
    let (len, month, spelled_in) = TEXTUAL.iter().find_map(|(m, month, langs)| {
        strip_prefix_ignore_case(word, m).map(|len| (len, *month, *langs))
    })?;
    if !languages.intersects(spelled_in) {
        return None;
    }
    *languages &= spelled_in;
    Some((month, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_names_narrow_the_language_mask() {
        let mut langs = Languages::default();
        assert_eq!(three_letter_any_language("Okt", &mut langs), Some(10));
        assert_eq!(langs, G | N | S);
        assert_eq!(three_letter_any_language("may", &mut langs), None);
        assert_eq!(three_letter_any_language("MAI", &mut langs), Some(5));
        assert_eq!(langs, G | N);
        assert_eq!(three_letter_any_language("mär", &mut langs), Some(3));
        assert_eq!(langs, G);
    }

    #[test]
    fn three_letter_lists() {
        let list = "jan feb mar apr may jun jul aug sep oct nov dec";
        assert_eq!(three_letter_from_list("DEC", list), Some(12));
        assert_eq!(three_letter_from_list("May", list), Some(5));
        assert_eq!(three_letter_from_list("xyz", list), None);
    }

    #[test]
    fn textual_months_report_consumed_length() {
        let mut langs = Languages::default();
        assert_eq!(textual_any_language("März", &mut langs), Some((3, "März".len())));
        assert_eq!(textual_any_language("Sept.2020", &mut langs), Some((9, 5)));
        assert_eq!(
            textual_from_list("juni", "Jan Feb Mar Apr Mai Juni Juli Aug Sep Okt Nov Dez"),
            Some((6, 4))
        );
    }
}
