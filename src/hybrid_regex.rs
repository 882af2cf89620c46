/// Case-insensitive regex that silently falls back from the Rust engine to PCRE2
/// for patterns only PCRE2 understands (lookaround, backreferences).
#[derive(Clone)]
pub enum HybridRegex {
    Rust(regex::Regex),
    Pcre2(pcre2::bytes::Regex),
}

// use string representation as a heuristic for regex equality
impl PartialEq for HybridRegex {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Rust(l0), Self::Rust(r0)) => l0.as_str() == r0.as_str(),
            (Self::Pcre2(l0), Self::Pcre2(r0)) => l0.as_str() == r0.as_str(),
            _ => false,
        }
    }
}

impl Eq for HybridRegex {}

impl HybridRegex {
    /// Compile `pattern` ignoring case. The error carries the engine's description.
    pub fn new(pattern: &str) -> Result<Self, String> {
        match regex::RegexBuilder::new(pattern).case_insensitive(true).build() {
            Ok(re) => Ok(HybridRegex::Rust(re)),
            Err(_) => {
                // Silent fallback to PCRE2
                match pcre2::bytes::RegexBuilder::new()
                    .caseless(true)
                    .utf(true)
                    .build(pattern)
                {
                    Ok(pcre2_re) => Ok(HybridRegex::Pcre2(pcre2_re)),
                    Err(pcre2_err) => Err(pcre2_err.to_string()),
                }
            }
        }
    }

    /// Byte offset of the first match starting the search at `start`.
    pub fn find_at(&self, text: &str, start: usize) -> Option<usize> {
        match self {
            HybridRegex::Rust(re) => re.find_at(text, start).map(|m| m.start()),
            HybridRegex::Pcre2(re) => re
                .find_at(text.as_bytes(), start)
                .ok()
                .flatten()
                .map(|m| m.start()),
        }
    }
}

impl std::fmt::Debug for HybridRegex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HybridRegex::Rust(re) => write!(f, "Regex({})", re.as_str()),
            HybridRegex::Pcre2(re) => write!(f, "Regex({})", re.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_ignore_case() {
        let re = HybridRegex::new("unix.*type").unwrap();
        assert!(matches!(re, HybridRegex::Rust(_)));
        assert_eq!(re.find_at("215 UNIX Type: L8", 0), Some(4));
        assert_eq!(re.find_at("xx UNIX type", 1), Some(3));
    }

    #[test]
    fn lookahead_falls_back_to_pcre2() {
        let re = HybridRegex::new("vx(?=works)").unwrap();
        assert!(matches!(re, HybridRegex::Pcre2(_)));
        assert_eq!(re.find_at("220 VxWorks FTP server", 0), Some(4));
        assert_eq!(re.find_at("220 VxSomething", 0), None);
    }

    #[test]
    fn invalid_in_both_engines() {
        assert!(HybridRegex::new("(unclosed").is_err());
    }
}
