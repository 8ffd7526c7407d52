use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

const DELIMITER: char = '.';

/// A dot-separated application version such as `"1.10.2"`.
///
/// Versions compare numerically component by component, and a shorter
/// version is padded with zero components first, so `"1.2"` equals
/// `"1.2.0"`. Serialized as the bare string.
///
/// # Examples
///
/// ```
/// use rulekit::Version;
///
/// assert!(Version::new("2.0") > Version::new("1.10"));
/// assert_eq!(Version::new("1.2"), Version::new("1.2.0"));
/// assert!(Version::new("1.2.3") < Version::new("1.10.0"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(raw: impl Into<String>) -> Self {
        Version(raw.into())
    }

    /// The version exactly as it was given.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Version {
    fn from(raw: &str) -> Self {
        Version::new(raw)
    }
}

impl From<String> for Version {
    fn from(raw: String) -> Self {
        Version(raw)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        compare(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0)
    }
}

/// Compare two dot-separated version strings.
///
/// The one with fewer components is right-padded with `"0"` components, then
/// both joined strings are compared with [`numeric_cmp`].
pub fn compare(a: &str, b: &str) -> Ordering {
    let mut lhs: Vec<&str> = a.split(DELIMITER).collect();
    let mut rhs: Vec<&str> = b.split(DELIMITER).collect();

    if lhs.len() == rhs.len() {
        return numeric_cmp(a, b);
    }

    let width = lhs.len().max(rhs.len());
    lhs.resize(width, "0");
    rhs.resize(width, "0");

    let delimiter = DELIMITER.to_string();
    numeric_cmp(&lhs.join(&delimiter), &rhs.join(&delimiter))
}

/// String comparison where runs of ASCII digits compare by numeric value,
/// so `"2" < "10"` and `"a9" < "a10"`. Everything else compares by character.
pub fn numeric_cmp(a: &str, b: &str) -> Ordering {
    let mut a = a.chars().peekable();
    let mut b = b.chars().peekable();

    loop {
        match (a.peek().copied(), b.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let lhs = digit_run(&mut a);
                let rhs = digit_run(&mut b);
                let ordering = cmp_digits(&lhs, &rhs);
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(x), Some(y)) => {
                let ordering = x.cmp(&y);
                if ordering != Ordering::Equal {
                    return ordering;
                }
                a.next();
                b.next();
            }
        }
    }
}

fn digit_run(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.next_if(char::is_ascii_digit) {
        run.push(c);
    }
    run
}

// Arbitrary length digit strings, no integer overflow.
fn cmp_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
