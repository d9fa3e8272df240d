use chrono::NaiveDate;

use crate::core::exclusion::ExclusionSet;
use crate::core::filters::{canonical_token, DiscoveryFilter};
use crate::models::Profile;

/// Why a pooled profile was dropped before distance evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Excluded,
    NotDiscoverable,
    PreferenceMismatch,
    Filtered,
}

/// `gender` is one of the genders in `preference`.
///
/// An empty preference accepts nobody: a user who has not stated who they
/// want to see is not shown to, or shown, anyone.
#[inline]
pub fn accepts(preference: &[String], gender: &str) -> bool {
    let gender = canonical_token(gender);
    preference.iter().any(|g| canonical_token(g) == gender)
}

/// Both parties' stated preferences accept the other's gender
#[inline]
pub fn preferences_align(requester: &Profile, candidate: &Profile) -> bool {
    accepts(&requester.preference, &candidate.gender) && accepts(&candidate.preference, &requester.gender)
}

/// Run every non-distance eligibility predicate.
///
/// Returns the candidate's age on `today` (if known) when eligible.
pub fn check(
    requester: &Profile,
    candidate: &Profile,
    exclusions: &ExclusionSet,
    filter: &DiscoveryFilter,
    today: NaiveDate,
) -> Result<Option<u32>, Rejection> {
    if candidate.user_id == requester.user_id || exclusions.contains(&candidate.user_id) {
        return Err(Rejection::Excluded);
    }
    if !candidate.is_discoverable() {
        return Err(Rejection::NotDiscoverable);
    }
    if !preferences_align(requester, candidate) {
        return Err(Rejection::PreferenceMismatch);
    }

    let age = candidate.age_on(today);
    if !filter.matches(candidate, age) {
        return Err(Rejection::Filtered);
    }
    Ok(age)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_is_case_insensitive() {
        let preference = vec!["Female".to_string(), "non-binary".to_string()];
        assert!(accepts(&preference, "female"));
        assert!(accepts(&preference, "Non Binary"));
        assert!(!accepts(&preference, "male"));
    }

    #[test]
    fn test_empty_preference_accepts_nobody() {
        assert!(!accepts(&[], "female"));
    }
}
