use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static EXACT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[1-5][0-9]{2}$").ok());
static CLASS: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^([1-5])[xX]{2}$").ok());

/// A key of a route's response map.
///
/// Precedence when looking up a status is `Exact` > `Class` > `Default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusSelector {
    /// A literal status code such as `200`.
    Exact(u16),
    /// A hundred range such as `2xx`; holds the leading digit.
    Class(u8),
    /// The `default` key.
    Default,
}

impl StatusSelector {
    /// Parse a response map key. Returns `None` for anything that is not a
    /// three digit code, a `<d>xx` pattern (either case) or `default`.
    ///
    /// ```
    /// use brrtserializer::response::StatusSelector;
    ///
    /// assert_eq!(StatusSelector::parse("201"), Some(StatusSelector::Exact(201)));
    /// assert_eq!(StatusSelector::parse("2XX"), Some(StatusSelector::Class(2)));
    /// assert_eq!(StatusSelector::parse("default"), Some(StatusSelector::Default));
    /// assert_eq!(StatusSelector::parse("20x"), None);
    /// ```
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        if key == "default" {
            return Some(StatusSelector::Default);
        }
        if EXACT.as_ref().is_some_and(|re| re.is_match(key)) {
            return key.parse().ok().map(StatusSelector::Exact);
        }
        CLASS
            .as_ref()
            .and_then(|re| re.captures(key))
            .and_then(|caps| caps.get(1))
            .and_then(|digit| digit.as_str().parse().ok())
            .map(StatusSelector::Class)
    }

    pub fn matches(&self, status: u16) -> bool {
        match self {
            StatusSelector::Exact(code) => *code == status,
            StatusSelector::Class(digit) => status / 100 == u16::from(*digit),
            StatusSelector::Default => true,
        }
    }

    /// Rank used to order lookups, lower wins.
    pub fn precedence(&self) -> u8 {
        match self {
            StatusSelector::Exact(_) => 0,
            StatusSelector::Class(_) => 1,
            StatusSelector::Default => 2,
        }
    }
}

/// Canonical label handed to compile functions: `200`, `2xx` or `default`.
impl fmt::Display for StatusSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusSelector::Exact(code) => write!(f, "{code}"),
            StatusSelector::Class(digit) => write!(f, "{digit}xx"),
            StatusSelector::Default => f.write_str("default"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_garbage() {
        for key in ["", "2x", "6xx", "99", "1000", "OK", "2xX0", "defaults"] {
            assert_eq!(StatusSelector::parse(key), None, "{key}");
        }
    }

    #[test]
    fn test_class_matches_hundred_range() {
        let sel = StatusSelector::parse("3xx").unwrap();
        assert!(sel.matches(300));
        assert!(sel.matches(301));
        assert!(sel.matches(399));
        assert!(!sel.matches(400));
        assert!(!sel.matches(299));
    }

    #[test]
    fn test_display_normalises_case() {
        assert_eq!(StatusSelector::parse("5XX").unwrap().to_string(), "5xx");
        assert_eq!(StatusSelector::Exact(404).to_string(), "404");
    }

    #[test]
    fn test_precedence_order() {
        let mut sels = vec![
            StatusSelector::Default,
            StatusSelector::Class(2),
            StatusSelector::Exact(200),
        ];
        sels.sort_by_key(StatusSelector::precedence);
        assert_eq!(sels[0], StatusSelector::Exact(200));
        assert_eq!(sels[2], StatusSelector::Default);
    }
}
