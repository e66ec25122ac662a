//! The rank hierarchy and its comparison primitives.
//!
//! Every check here is pure and total. `None` stands for "no rank assigned"
//! and never satisfies a minimum-rank or exact-rank check.

use crate::error::Error;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A position in the four-level hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Crew,
    Captain,
    Commodore,
    Admiral,
}

impl Rank {
    /// All ranks, lowest first.
    pub const ALL: [Rank; 4] = [Rank::Crew, Rank::Captain, Rank::Commodore, Rank::Admiral];

    /// The least privileged rank.
    pub const LOWEST: Rank = Rank::Crew;

    /// Integer hierarchy level (crew = 0 ... admiral = 3).
    pub const fn level(self) -> u8 {
        match self {
            Rank::Crew => 0,
            Rank::Captain => 1,
            Rank::Commodore => 2,
            Rank::Admiral => 3,
        }
    }

    /// Rank at the given hierarchy level.
    pub const fn from_level(level: u8) -> Option<Rank> {
        match level {
            0 => Some(Rank::Crew),
            1 => Some(Rank::Captain),
            2 => Some(Rank::Commodore),
            3 => Some(Rank::Admiral),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Rank::Crew => "crew",
            Rank::Captain => "captain",
            Rank::Commodore => "commodore",
            Rank::Admiral => "admiral",
        }
    }

    /// Interpret an untrusted rank string, falling back to the lowest rank.
    ///
    /// Anything outside the enumerated set (including different casing or
    /// surrounding whitespace) is crew.
    pub fn from_claim(claim: &str) -> Rank {
        claim.parse().unwrap_or(Rank::LOWEST)
    }
}

impl Ord for Rank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.level().cmp(&other.level())
    }
}

impl PartialOrd for Rank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "crew" => Ok(Rank::Crew),
            "captain" => Ok(Rank::Captain),
            "commodore" => Ok(Rank::Commodore),
            "admiral" => Ok(Rank::Admiral),
            other => Err(Error::UnknownRank(other.to_string())),
        }
    }
}

/// True iff `user` meets or exceeds `required`.
pub fn has_minimum_rank(user: Option<Rank>, required: Rank) -> bool {
    match user {
        Some(rank) => rank.level() >= required.level(),
        None => false,
    }
}

/// True iff `user` is exactly `target`.
pub fn has_exact_rank(user: Option<Rank>, target: Rank) -> bool {
    user.map(Rank::level) == Some(target.level())
}

pub fn is_captain_or_higher(user: Option<Rank>) -> bool {
    has_minimum_rank(user, Rank::Captain)
}

pub fn is_commodore_or_higher(user: Option<Rank>) -> bool {
    has_minimum_rank(user, Rank::Commodore)
}

pub fn is_admiral(user: Option<Rank>) -> bool {
    has_exact_rank(user, Rank::Admiral)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimum_rank_follows_levels() {
        for a in Rank::ALL {
            for b in Rank::ALL {
                assert_eq!(has_minimum_rank(Some(a), b), a.level() >= b.level(), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn minimum_rank_named_cases() {
        assert!(has_minimum_rank(Some(Rank::Admiral), Rank::Crew));
        assert!(!has_minimum_rank(Some(Rank::Crew), Rank::Admiral));
        assert!(!has_minimum_rank(None, Rank::Crew));
    }

    #[test]
    fn ordering_is_not_lexical() {
        // "admiral" < "captain" < "commodore" < "crew" as strings.
        assert!(Rank::Admiral > Rank::Crew);
        assert!(Rank::Commodore > Rank::Captain);
        let mut ranks = vec![Rank::Commodore, Rank::Crew, Rank::Admiral, Rank::Captain];
        ranks.sort();
        assert_eq!(ranks, Rank::ALL.to_vec());
    }

    #[test]
    fn exact_rank_and_shortcuts() {
        assert!(has_exact_rank(Some(Rank::Captain), Rank::Captain));
        assert!(!has_exact_rank(Some(Rank::Admiral), Rank::Captain));
        assert!(!has_exact_rank(None, Rank::Crew));

        assert!(is_captain_or_higher(Some(Rank::Captain)));
        assert!(!is_captain_or_higher(Some(Rank::Crew)));
        assert!(is_commodore_or_higher(Some(Rank::Admiral)));
        assert!(!is_commodore_or_higher(Some(Rank::Captain)));
        assert!(is_admiral(Some(Rank::Admiral)));
        assert!(!is_admiral(Some(Rank::Commodore)));
        assert!(!is_admiral(None));
    }

    #[test]
    fn level_roundtrip() {
        for rank in Rank::ALL {
            assert_eq!(Rank::from_level(rank.level()), Some(rank));
        }
        assert_eq!(Rank::from_level(4), None);
    }

    #[test]
    fn parse_strict_and_lenient() {
        assert_eq!("commodore".parse::<Rank>(), Ok(Rank::Commodore));
        assert!(matches!("Admiral".parse::<Rank>(), Err(Error::UnknownRank(_))));

        assert_eq!(Rank::from_claim("captain"), Rank::Captain);
        assert_eq!(Rank::from_claim("ADMIRAL"), Rank::Crew);
        assert_eq!(Rank::from_claim("superuser"), Rank::Crew);
        assert_eq!(Rank::from_claim(""), Rank::Crew);
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&Rank::Admiral).unwrap(), "\"admiral\"");
        let parsed: Rank = serde_json::from_str("\"captain\"").unwrap();
        assert_eq!(parsed, Rank::Captain);
        assert!(serde_json::from_str::<Rank>("\"pirate\"").is_err());
    }
}
