use std::collections::TryReserveError;

/// Marker for an allocation that could not be satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfMemory;

impl From<TryReserveError> for OutOfMemory {
    fn from(_: TryReserveError) -> Self {
        OutOfMemory
    }
}

/// Copy `s` into a freshly allocated string, reporting allocation failure instead of aborting.
pub fn try_string(s: &str) -> Result<String, OutOfMemory> {
    let mut out = String::new();
    out.try_reserve_exact(s.len())?;
    out.push_str(s);
    Ok(out)
}

/// Concatenate two string slices into a new allocation.
pub fn try_concat(a: &str, b: &str) -> Result<String, OutOfMemory> {
    let mut out = String::new();
    out.try_reserve_exact(a.len() + b.len())?;
    out.push_str(a);
    out.push_str(b);
    Ok(out)
}

pub fn try_push<T>(v: &mut Vec<T>, x: T) -> Result<(), OutOfMemory> {
    v.try_reserve(1)?;
    v.push(x);
    Ok(())
}

/// Largest char boundary in `s` that is `<= max`.
pub fn floor_char_boundary(s: &str, max: usize) -> usize {
    if max >= s.len() {
        return s.len();
    }
    let mut i = max;
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// ASCII-and-Unicode case-insensitive forward search. Returns the byte range of the first match.
pub fn find_case_insensitive(haystack: &str, needle: &str) -> Option<(usize, usize)> {
    if needle.is_empty() {
        return Some((0, 0));
    }
    for (start, _) in haystack.char_indices() {
        let mut hay = haystack[start..].char_indices();
        let mut matched_end = None;
        let mut ok = true;
        for n in needle.chars() {
            match hay.next() {
                Some((off, h)) if chars_eq_ignore_case(h, n) => {
                    matched_end = Some(start + off + h.len_utf8());
                }
                _ => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            if let Some(end) = matched_end {
                return Some((start, end));
            }
        }
    }
    None
}

pub fn chars_eq_ignore_case(a: char, b: char) -> bool {
    a == b || a.to_lowercase().eq(b.to_lowercase())
}

pub fn str_eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars().count() == b.chars().count()
        && a.chars().zip(b.chars()).all(|(x, y)| chars_eq_ignore_case(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_needle_regardless_of_case() {
        assert_eq!(find_case_insensitive("Total: 12 DIR", "dir"), Some((10, 13)));
        assert_eq!(find_case_insensitive("abc", "abcd"), None);
        assert_eq!(find_case_insensitive("xyz", ""), Some((0, 0)));
    }

    #[test]
    fn floors_to_char_boundary() {
        let s = "aä";
        assert_eq!(floor_char_boundary(s, 2), 1);
        assert_eq!(floor_char_boundary(s, 10), 3);
    }
}
