use std::fs;
use std::path::Path;

use crate::mseed_error::{MSResult, MSeedError};
use crate::nstime::NsTime;

/// One time window of a selection entry; an unset bound is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectTime {
    pub start: NsTime,
    pub end: NsTime,
}

impl SelectTime {
    pub fn open() -> SelectTime {
        SelectTime {
            start: NsTime::UNSET,
            end: NsTime::UNSET,
        }
    }

    /// True when this window overlaps `[start, end]`. Unset bounds on
    /// either side are open.
    pub fn overlaps(&self, start: NsTime, end: NsTime) -> bool {
        (self.start.is_unset() || !end.is_set() || self.start <= end)
            && (self.end.is_unset() || !start.is_set() || self.end >= start)
    }
}

/// A selection entry: source identifier glob, publication version (0 for
/// any) and a nonempty list of time windows.
#[derive(Debug, Clone)]
pub struct SelectEntry {
    pub sid_glob: String,
    pub pub_version: u8,
    pub windows: Vec<SelectTime>,
}

/// An ordered list of selection entries used to filter records.
#[derive(Debug, Clone, Default)]
pub struct Selections {
    entries: Vec<SelectEntry>,
}

impl Selections {
    pub fn new() -> Selections {
        Selections::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<SelectEntry> {
        self.entries.iter()
    }

    /// Adds a time window for the glob/version pair, merging into an
    /// existing entry with the same pair.
    pub fn add(&mut self, sid_glob: &str, pub_version: u8, start: NsTime, end: NsTime) {
        let window = SelectTime { start, end };
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.sid_glob == sid_glob && e.pub_version == pub_version)
        {
            entry.windows.push(window);
            return;
        }
        self.entries.push(SelectEntry {
            sid_glob: sid_glob.to_string(),
            pub_version,
            windows: vec![window],
        });
    }

    /// The first entry whose glob matches `sid`, whose publication version
    /// is 0 or equal to `pub_version`, and one of whose windows overlaps
    /// `[start, end]`; returns the entry and the matching window.
    pub fn matched(
        &self,
        sid: &str,
        start: NsTime,
        end: NsTime,
        pub_version: u8,
    ) -> Option<(&SelectEntry, &SelectTime)> {
        for entry in &self.entries {
            if entry.pub_version != 0 && entry.pub_version != pub_version {
                continue;
            }
            if !glob_match(&entry.sid_glob, sid) {
                continue;
            }
            if let Some(window) = entry.windows.iter().find(|w| w.overlaps(start, end)) {
                return Some((entry, window));
            }
        }
        None
    }

    /// Parses selections from text, one per line:
    /// `SID_GLOB [START END [PUBVERSION]]` with `*` as an open bound.
    /// Blank lines and lines starting with `#` are ignored.
    pub fn parse_text(text: &str) -> MSResult<Selections> {
        let mut selections = Selections::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let bound = |s: &str| -> MSResult<NsTime> {
                if s == "*" {
                    Ok(NsTime::UNSET)
                } else {
                    NsTime::parse(s)
                }
            };
            let (start, end, pub_version) = match fields.len() {
                1 => (NsTime::UNSET, NsTime::UNSET, 0),
                3 => (bound(fields[1])?, bound(fields[2])?, 0),
                4 => (
                    bound(fields[1])?,
                    bound(fields[2])?,
                    fields[3].parse().map_err(|_| {
                        MSeedError::Generic(format!(
                            "invalid publication version on selection line {}",
                            lineno + 1
                        ))
                    })?,
                ),
                _ => {
                    return Err(MSeedError::Generic(format!(
                        "invalid selection line {}: `{}`",
                        lineno + 1,
                        line
                    )))
                }
            };
            selections.add(fields[0], pub_version, start, end);
        }
        Ok(selections)
    }

    /// Reads selections from a file in the [`Selections::parse_text`]
    /// grammar.
    pub fn read_file<P: AsRef<Path>>(path: P) -> MSResult<Selections> {
        Selections::parse_text(&fs::read_to_string(path)?)
    }
}

impl<'a> IntoIterator for &'a Selections {
    type Item = &'a SelectEntry;
    type IntoIter = std::slice::Iter<'a, SelectEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Glob matching with `*`, `?` and `[...]` character classes (`[!...]`
/// negates, ranges like `a-z` are supported).
pub fn glob_match(pattern: &str, s: &str) -> bool {
    glob_match_bytes(pattern.as_bytes(), s.as_bytes())
}

fn glob_match_bytes(pattern: &[u8], s: &[u8]) -> bool {
    let mut p = 0;
    let mut i = 0;
    // backtrack points for the most recent *
    let mut star_p = usize::MAX;
    let mut star_i = 0;
    while i < s.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    star_p = p;
                    star_i = i;
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    i += 1;
                    continue;
                }
                b'[' => {
                    if let Some((matched, next_p)) = class_match(pattern, p, s[i]) {
                        if matched {
                            p = next_p;
                            i += 1;
                            continue;
                        }
                    }
                }
                c if c == s[i] => {
                    p += 1;
                    i += 1;
                    continue;
                }
                _ => {}
            }
        }
        if star_p != usize::MAX {
            // let the last * absorb one more byte
            p = star_p + 1;
            star_i += 1;
            i = star_i;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

/// Matches `c` against the class starting at `pattern[start] == b'['`.
/// Returns (matched, index past the closing bracket), or `None` when the
/// class is unterminated.
fn class_match(pattern: &[u8], start: usize, c: u8) -> Option<(bool, usize)> {
    let mut p = start + 1;
    let negate = p < pattern.len() && pattern[p] == b'!';
    if negate {
        p += 1;
    }
    let mut matched = false;
    let mut first = true;
    while p < pattern.len() {
        if pattern[p] == b']' && !first {
            return Some((matched != negate, p + 1));
        }
        first = false;
        if p + 2 < pattern.len() && pattern[p + 1] == b'-' && pattern[p + 2] != b']' {
            if pattern[p] <= c && c <= pattern[p + 2] {
                matched = true;
            }
            p += 3;
        } else {
            if pattern[p] == c {
                matched = true;
            }
            p += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_basics() {
        assert!(glob_match("FDSN:XX_*", "FDSN:XX_S2__L_H_Z"));
        assert!(!glob_match("FDSN:XX_*", "FDSN:YY_S2__L_H_Z"));
        assert!(glob_match("FDSN:??_STA1__B_H_Z", "FDSN:YY_STA1__B_H_Z"));
        assert!(glob_match("*_H_Z", "FDSN:YY_STA1__B_H_Z"));
        assert!(glob_match("FDSN:XX_TEST__[LB]_H_Z", "FDSN:XX_TEST__L_H_Z"));
        assert!(!glob_match("FDSN:XX_TEST__[!LB]_H_Z", "FDSN:XX_TEST__B_H_Z"));
        assert!(glob_match("FDSN:XX_TEST__[A-M]_H_Z", "FDSN:XX_TEST__L_H_Z"));
        assert!(glob_match("*", "anything"));
        assert!(glob_match("exact", "exact"));
        assert!(!glob_match("exact", "exactly"));
    }

    #[test]
    fn match_by_glob_version_and_window() {
        let mut selections = Selections::new();
        selections.add("FDSN:XX_*", 0, NsTime::UNSET, NsTime::UNSET);
        selections.add("FDSN:YY_STA1__B_H_Z", 0, NsTime::UNSET, NsTime::UNSET);
        selections.add(
            "FDSN:YY_STA1__L_H_Z",
            2,
            NsTime::parse("2010-02-27T06:50:00.069539Z").unwrap(),
            NsTime::parse("2010-02-27T07:55:51.069539Z").unwrap(),
        );

        // any version matches a 0-version entry
        assert!(selections
            .matched("FDSN:XX_S2__L_H_Z", NsTime::UNSET, NsTime::UNSET, 1)
            .is_some());
        // version 3 does not match the version-2 entry
        assert!(selections
            .matched("FDSN:YY_STA1__L_H_Z", NsTime::UNSET, NsTime::UNSET, 3)
            .is_none());
        // version 2 with an overlapping window matches
        let hit = selections.matched(
            "FDSN:YY_STA1__L_H_Z",
            NsTime::parse("2010-02-27T07:00:00Z").unwrap(),
            NsTime::parse("2010-02-27T07:10:00Z").unwrap(),
            2,
        );
        assert!(hit.is_some());
        let (entry, window) = hit.unwrap();
        assert_eq!(entry.sid_glob, "FDSN:YY_STA1__L_H_Z");
        assert!(window.start.is_set());
        // outside the window does not match
        assert!(selections
            .matched(
                "FDSN:YY_STA1__L_H_Z",
                NsTime::parse("2011-01-01T00:00:00Z").unwrap(),
                NsTime::parse("2011-01-01T01:00:00Z").unwrap(),
                2
            )
            .is_none());
    }

    #[test]
    fn windows_merge_per_entry() {
        let mut selections = Selections::new();
        selections.add(
            "FDSN:XX_*",
            0,
            NsTime::parse("2010-01-01").unwrap(),
            NsTime::parse("2010-01-02").unwrap(),
        );
        selections.add(
            "FDSN:XX_*",
            0,
            NsTime::parse("2010-02-01").unwrap(),
            NsTime::parse("2010-02-02").unwrap(),
        );
        assert_eq!(selections.len(), 1);
        assert_eq!(selections.iter().next().unwrap().windows.len(), 2);
        assert!(selections
            .matched(
                "FDSN:XX_A__B_H_Z",
                NsTime::parse("2010-02-01T12:00:00").unwrap(),
                NsTime::parse("2010-02-01T13:00:00").unwrap(),
                0
            )
            .is_some());
        assert!(selections
            .matched(
                "FDSN:XX_A__B_H_Z",
                NsTime::parse("2010-03-01").unwrap(),
                NsTime::parse("2010-03-02").unwrap(),
                0
            )
            .is_none());
    }

    #[test]
    fn parse_selection_text() {
        let text = "\
# selections
FDSN:XX_* * * 0

FDSN:YY_STA1__L_H_Z 2010-02-27T06:50:00.069539Z 2010-02-27T07:55:51.069539Z 2
FDSN:ZZ_ONLY__B_H_Z
";
        let selections = Selections::parse_text(text).unwrap();
        assert_eq!(selections.len(), 3);
        let entries: Vec<&SelectEntry> = selections.iter().collect();
        assert_eq!(entries[0].sid_glob, "FDSN:XX_*");
        assert!(entries[0].windows[0].start.is_unset());
        assert_eq!(entries[1].pub_version, 2);
        assert!(entries[1].windows[0].start.is_set());
        assert_eq!(entries[2].sid_glob, "FDSN:ZZ_ONLY__B_H_Z");
    }

    #[test]
    fn bad_selection_line_rejected() {
        assert!(Selections::parse_text("FDSN:XX_* 2010-01-01").is_err());
        assert!(Selections::parse_text("FDSN:XX_* nonsense * 0").is_err());
    }

    #[test]
    fn match_is_pure() {
        let mut selections = Selections::new();
        selections.add("FDSN:XX_*", 0, NsTime::UNSET, NsTime::UNSET);
        let a = selections
            .matched("FDSN:XX_S__B_H_Z", NsTime::UNSET, NsTime::UNSET, 1)
            .map(|(e, _)| e.sid_glob.clone());
        let b = selections
            .matched("FDSN:XX_S__B_H_Z", NsTime::UNSET, NsTime::UNSET, 1)
            .map(|(e, _)| e.sid_glob.clone());
        assert_eq!(a, b);
    }
}
