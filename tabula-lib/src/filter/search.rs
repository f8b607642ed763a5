//! Full-text search matching.

use nucleo_matcher::Config;
use nucleo_matcher::Matcher;
use nucleo_matcher::Utf32Str;
use nucleo_matcher::pattern::AtomKind;
use nucleo_matcher::pattern::CaseMatching;
use nucleo_matcher::pattern::Normalization;
use nucleo_matcher::pattern::Pattern;

use super::SearchMode;

/// Matches cell text against a search value.
pub(crate) enum SearchMatcher {
    Substring(String),
    Fuzzy {
        pattern: Pattern,
        matcher: Box<Matcher>,
        buf: Vec<char>,
    },
}

impl SearchMatcher {
    pub(crate) fn new(query: &str, mode: SearchMode) -> Self {
        let query = query.trim();
        match mode {
            SearchMode::Substring => SearchMatcher::Substring(query.to_lowercase()),
            SearchMode::Fuzzy => SearchMatcher::Fuzzy {
                pattern: Pattern::new(
                    query,
                    CaseMatching::Ignore,
                    Normalization::Smart,
                    AtomKind::Fuzzy,
                ),
                matcher: Box::new(Matcher::new(Config::DEFAULT)),
                buf: Vec::new(),
            },
        }
    }

    pub(crate) fn is_match(&mut self, text: &str) -> bool {
        match self {
            SearchMatcher::Substring(needle) => text.to_lowercase().contains(needle.as_str()),
            SearchMatcher::Fuzzy {
                pattern,
                matcher,
                buf,
            } => {
                let haystack = Utf32Str::new(text, buf);
                pattern.score(haystack, matcher).is_some()
            }
        }
    }
}
