//! Multi-party signing schemas.
//!
//! A schema declares which signer identities must participate in a
//! multi-party signature over a governed packet name: a set of *required*
//! wildcard patterns, each with a multiplicity, plus *optional* patterns
//! that together must contribute a minimum number of distinct signers.
//!
//! Wildcarding uses the generic `_` component and nothing else: `/a/_/c`
//! matches any three-component name whose first and last components are
//! byte-equal to `a` and `c`. A pattern may carry a multiplicity prefix in
//! its text form (`3x/a/_` means "three distinct names matching `/a/_`").

use crate::name::{Component, Name};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{self, Display},
    str::FromStr,
};
use thiserror::Error;

pub mod container;

pub use container::MultipartySchemaContainer;

/// Errors produced by schema construction, parsing, and key aggregation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("pattern multiplicity must be at least 1")]
    ZeroTimes,
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("unknown signer: {0}")]
    UnknownSigner(Name),
    #[error("empty signer list")]
    EmptySignerList,
    #[error("malformed schema: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A name pattern where any `_` generic component matches a single arbitrary
/// component, with a multiplicity: the pattern must be matched by `times`
/// distinct concrete names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WildCardName {
    pattern: Name,
    times: u32,
}

fn is_wildcard(component: &Component) -> bool {
    component.is_generic() && component.value() == b"_"
}

impl WildCardName {
    /// Creates a pattern with multiplicity 1.
    pub fn new(pattern: Name) -> Self {
        Self { pattern, times: 1 }
    }

    /// Creates a pattern with the given multiplicity. A multiplicity of zero
    /// is meaningless and rejected.
    pub fn with_times(pattern: Name, times: u32) -> Result<Self, Error> {
        if times == 0 {
            return Err(Error::ZeroTimes);
        }
        Ok(Self { pattern, times })
    }

    pub fn pattern(&self) -> &Name {
        &self.pattern
    }

    pub fn times(&self) -> u32 {
        self.times
    }

    /// Returns whether the concrete name matches this pattern: equal
    /// component counts, with every non-wildcard position byte-equal.
    pub fn matches(&self, name: &Name) -> bool {
        self.pattern.len() == name.len()
            && self
                .pattern
                .components()
                .iter()
                .zip(name.components())
                .all(|(pattern, concrete)| is_wildcard(pattern) || pattern == concrete)
    }
}

impl Default for WildCardName {
    fn default() -> Self {
        Self::new(Name::new())
    }
}

impl From<Name> for WildCardName {
    fn from(pattern: Name) -> Self {
        Self::new(pattern)
    }
}

impl Display for WildCardName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.times > 1 {
            write!(f, "{}x", self.times)?;
        }
        Display::fmt(&self.pattern, f)
    }
}

impl FromStr for WildCardName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (times, uri) = match s.find('/') {
            Some(0) => (1, s),
            Some(idx) => {
                let times = s[..idx]
                    .strip_suffix('x')
                    .and_then(|digits| digits.parse::<u32>().ok())
                    .ok_or_else(|| Error::InvalidPattern(s.to_string()))?;
                (times, &s[idx..])
            }
            None => return Err(Error::InvalidPattern(s.to_string())),
        };
        let pattern = uri
            .parse::<Name>()
            .map_err(|_| Error::InvalidPattern(s.to_string()))?;
        Self::with_times(pattern, times)
    }
}

impl TryFrom<String> for WildCardName {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<WildCardName> for String {
    fn from(pattern: WildCardName) -> Self {
        pattern.to_string()
    }
}

/// A multi-party signing schema.
///
/// The schema is satisfied by a signer set when every required pattern has
/// `times` distinct matches in the set (a signer may count toward several
/// patterns, but only once within each), and the optional patterns together
/// admit at least `min_optional_signers` distinct signers, each pattern
/// accepting at most its `times`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MultipartySchema {
    /// The data names this schema governs.
    #[serde(rename = "pkt-name", default)]
    pub pkt_name: WildCardName,
    #[serde(rename = "rule-id", default)]
    pub rule_id: String,
    /// Required signer patterns.
    #[serde(rename = "all-of", default)]
    pub signers: Vec<WildCardName>,
    /// Optional signer patterns, contributing toward `min_optional_signers`.
    #[serde(rename = "at-least", default)]
    pub optional_signers: Vec<WildCardName>,
    /// The minimum number of distinct optional signers.
    #[serde(rename = "at-least-num", default)]
    pub min_optional_signers: usize,
}

impl MultipartySchema {
    /// Parses a schema from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(json)?)
    }

    /// Renders the schema to its JSON form.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns whether this schema governs the given packet name.
    pub fn match_packet(&self, packet_name: &Name) -> bool {
        self.pkt_name.matches(packet_name)
    }

    /// Returns the patterns (required or optional) the key matches.
    pub fn key_matches(&self, key: &Name) -> Vec<&WildCardName> {
        self.signers
            .iter()
            .chain(self.optional_signers.iter())
            .filter(|pattern| pattern.matches(key))
            .collect()
    }

    /// Returns whether the signer set satisfies this schema. Duplicate names
    /// are deduplicated before matching.
    pub fn is_satisfied(&self, signers: &[Name]) -> bool {
        let mut seen = BTreeSet::new();
        let candidates: Vec<&Name> = signers.iter().filter(|name| seen.insert(*name)).collect();
        for pattern in &self.signers {
            let matches = candidates
                .iter()
                .filter(|name| pattern.matches(name))
                .count();
            if matches < pattern.times as usize {
                return false;
            }
        }
        self.optional_coverage(&candidates) >= self.min_optional_signers
    }

    /// Returns a minimal subset of `available` that satisfies this schema,
    /// or `None` when no subset does.
    ///
    /// Candidates are considered in first-seen order, which makes the result
    /// deterministic for a deterministic input order. Required patterns are
    /// filled first, reusing already-selected names wherever they match, and
    /// optional patterns are then topped up to exactly
    /// `min_optional_signers`.
    pub fn min_signers(&self, available: &[Name]) -> Option<Vec<Name>> {
        let mut seen = BTreeSet::new();
        let candidates: Vec<&Name> = available.iter().filter(|name| seen.insert(*name)).collect();

        let mut selected: Vec<&Name> = Vec::new();
        for pattern in &self.signers {
            let needed = pattern.times as usize;
            let mut have = selected
                .iter()
                .filter(|name| pattern.matches(name))
                .count();
            for &candidate in &candidates {
                if have >= needed {
                    break;
                }
                if !selected.contains(&candidate) && pattern.matches(candidate) {
                    selected.push(candidate);
                    have += 1;
                }
            }
            if have < needed {
                return None;
            }
        }

        let mut coverage = self.optional_coverage(&selected);
        for &candidate in &candidates {
            if coverage >= self.min_optional_signers {
                break;
            }
            if selected.contains(&candidate) {
                continue;
            }
            selected.push(candidate);
            let extended = self.optional_coverage(&selected);
            if extended > coverage {
                coverage = extended;
            } else {
                selected.pop();
            }
        }
        if coverage < self.min_optional_signers {
            return None;
        }
        Some(selected.into_iter().cloned().collect())
    }

    /// Returns the number of distinct candidates the optional patterns can
    /// absorb, each pattern capped at its multiplicity: the size of a
    /// maximum assignment of candidates to pattern seats, computed with
    /// augmenting paths.
    fn optional_coverage(&self, candidates: &[&Name]) -> usize {
        if self.optional_signers.is_empty() || candidates.is_empty() {
            return 0;
        }
        let mut assigned: Vec<Vec<usize>> = vec![Vec::new(); self.optional_signers.len()];
        for candidate in 0..candidates.len() {
            let mut visited = vec![false; self.optional_signers.len()];
            self.try_assign(candidate, candidates, &mut assigned, &mut visited);
        }
        assigned.iter().map(Vec::len).sum()
    }

    /// Seats `candidate` under some matching optional pattern, relocating
    /// existing occupants along an augmenting path when every matching
    /// pattern is full. Returns whether a seat was found.
    fn try_assign(
        &self,
        candidate: usize,
        candidates: &[&Name],
        assigned: &mut [Vec<usize>],
        visited: &mut [bool],
    ) -> bool {
        for (slot, pattern) in self.optional_signers.iter().enumerate() {
            if visited[slot] || !pattern.matches(candidates[candidate]) {
                continue;
            }
            visited[slot] = true;
            if assigned[slot].len() < pattern.times as usize {
                assigned[slot].push(candidate);
                return true;
            }
            for seat in 0..assigned[slot].len() {
                let occupant = assigned[slot][seat];
                if self.try_assign(occupant, candidates, assigned, visited) {
                    assigned[slot][seat] = candidate;
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    fn names(uris: &[&str]) -> Vec<Name> {
        uris.iter().map(|s| name(s)).collect()
    }

    fn pattern(s: &str) -> WildCardName {
        s.parse().unwrap()
    }

    #[test]
    fn test_wildcard_matching() {
        let p = pattern("/a/b/_");
        assert!(p.matches(&name("/a/b/c")));
        assert!(p.matches(&name("/a/b/_")));
        assert!(!p.matches(&name("/a/b")));
        assert!(!p.matches(&name("/a/b/c/d")));
        assert!(!p.matches(&name("/a/x/c")));
    }

    #[test]
    fn test_pattern_text_form() {
        assert_eq!(pattern("/a/_").times(), 1);
        let p = pattern("3x/A/_");
        assert_eq!(p.times(), 3);
        assert_eq!(p.pattern(), &name("/A/_"));
        assert_eq!(p.to_string(), "3x/A/_");
        assert_eq!(pattern("/a/_").to_string(), "/a/_");
        assert!("0x/A/_".parse::<WildCardName>().is_err());
        assert!("3y/A/_".parse::<WildCardName>().is_err());
        assert!("A/_".parse::<WildCardName>().is_err());
    }

    #[test]
    fn test_zero_times_rejected() {
        assert!(matches!(
            WildCardName::with_times(name("/a"), 0),
            Err(Error::ZeroTimes)
        ));
    }

    #[test]
    fn test_required_multiplicity() {
        // Required pattern 3x/A/_ needs three distinct matches.
        let schema = MultipartySchema {
            signers: vec![pattern("3x/A/_")],
            ..Default::default()
        };
        assert!(schema.is_satisfied(&names(&["/A/1", "/A/2", "/A/3"])));
        assert!(!schema.is_satisfied(&names(&["/A/1", "/A/2", "/B/1"])));
        // Duplicates collapse before matching.
        assert!(!schema.is_satisfied(&names(&["/A/1", "/A/1", "/A/2"])));
    }

    #[test]
    fn test_required_patterns_share_signers() {
        // One concrete name may count toward several overlapping patterns.
        let schema = MultipartySchema {
            signers: vec![pattern("/A/_"), pattern("/A/1")],
            ..Default::default()
        };
        assert!(schema.is_satisfied(&names(&["/A/1"])));
        assert!(!schema.is_satisfied(&names(&["/A/2"])));
    }

    #[test]
    fn test_optional_bound() {
        let schema = MultipartySchema {
            optional_signers: vec![pattern("2x/A/_"), pattern("2x/B/_")],
            min_optional_signers: 3,
            ..Default::default()
        };
        assert!(schema.is_satisfied(&names(&["/A/1", "/A/2", "/B/1"])));
        assert!(!schema.is_satisfied(&names(&["/A/1", "/B/1"])));
        // The per-pattern cap binds: a third /A name cannot substitute.
        assert!(!schema.is_satisfied(&names(&["/A/1", "/A/2", "/A/3"])));
    }

    #[test]
    fn test_optional_overlap_assignment() {
        // /A/1 matches both patterns; the assignment must route it to
        // whichever pattern leaves room for the others.
        let schema = MultipartySchema {
            optional_signers: vec![pattern("/A/_"), pattern("/A/1")],
            min_optional_signers: 2,
            ..Default::default()
        };
        assert!(schema.is_satisfied(&names(&["/A/1", "/A/2"])));
        assert!(!schema.is_satisfied(&names(&["/A/2", "/A/3"])));
    }

    #[test]
    fn test_empty_schema_is_satisfied_by_anything() {
        let schema = MultipartySchema::default();
        assert!(schema.is_satisfied(&[]));
        assert!(schema.is_satisfied(&names(&["/a"])));
    }

    #[test]
    fn test_min_signers_minimal() {
        let schema = MultipartySchema {
            signers: vec![pattern("2x/A/_")],
            ..Default::default()
        };
        let selected = schema
            .min_signers(&names(&["/A/1", "/A/2", "/A/3", "/B/1"]))
            .unwrap();
        assert_eq!(selected, names(&["/A/1", "/A/2"]));
        assert!(schema
            .min_signers(&names(&["/A/1", "/B/1", "/B/2"]))
            .is_none());
    }

    #[test]
    fn test_min_signers_reuses_across_patterns() {
        let schema = MultipartySchema {
            signers: vec![pattern("/A/1"), pattern("/A/_")],
            ..Default::default()
        };
        let selected = schema.min_signers(&names(&["/A/2", "/A/1"])).unwrap();
        assert_eq!(selected, names(&["/A/1"]));
    }

    #[test]
    fn test_min_signers_fills_optionals_to_bound() {
        let schema = MultipartySchema {
            signers: vec![pattern("/A/_")],
            optional_signers: vec![pattern("2x/B/_")],
            min_optional_signers: 1,
            ..Default::default()
        };
        let selected = schema
            .min_signers(&names(&["/A/1", "/B/1", "/B/2"]))
            .unwrap();
        assert_eq!(selected, names(&["/A/1", "/B/1"]));
    }

    #[test]
    fn test_key_matches() {
        let schema = MultipartySchema {
            signers: vec![pattern("/A/_")],
            optional_signers: vec![pattern("/B/_")],
            ..Default::default()
        };
        assert_eq!(schema.key_matches(&name("/A/1")).len(), 1);
        assert_eq!(schema.key_matches(&name("/B/1")).len(), 1);
        assert!(schema.key_matches(&name("/C/1")).is_empty());
    }

    #[test]
    fn test_json_reload_equivalence() {
        let schema = MultipartySchema {
            pkt_name: pattern("/pkt/_"),
            rule_id: "rule-1".to_string(),
            signers: vec![pattern("/a/b/_"), pattern("2x/c/_")],
            optional_signers: vec![pattern("2x/A/_"), pattern("2x/B/_")],
            min_optional_signers: 3,
        };
        let reloaded = MultipartySchema::from_json(&schema.to_json().unwrap()).unwrap();
        assert_eq!(reloaded, schema);
        for candidate in [
            names(&["/a/b/x", "/c/1", "/c/2", "/A/1", "/A/2", "/B/1"]),
            names(&["/a/b/x", "/c/1", "/c/2", "/A/1", "/B/1"]),
            names(&[]),
        ] {
            assert_eq!(
                schema.is_satisfied(&candidate),
                reloaded.is_satisfied(&candidate)
            );
        }
    }

    #[test]
    fn test_json_field_names() {
        let json = r#"{
            "rule-id": "r",
            "pkt-name": "/data/_",
            "all-of": ["/a/_"],
            "at-least-num": 1,
            "at-least": ["2x/b/_"]
        }"#;
        let schema = MultipartySchema::from_json(json).unwrap();
        assert_eq!(schema.rule_id, "r");
        assert!(schema.match_packet(&name("/data/x")));
        assert_eq!(schema.signers, vec![pattern("/a/_")]);
        assert_eq!(schema.optional_signers, vec![pattern("2x/b/_")]);
        assert_eq!(schema.min_optional_signers, 1);
    }
}
