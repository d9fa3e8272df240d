use std::collections::BTreeSet;

use serde::Deserialize;

use crate::core::distance::DistanceUnit;
use crate::models::{Profile, RawFilters};

/// What the normalizer does with an enumerated token outside the vocabulary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTokenPolicy {
    /// Keep the token as a literal predicate (it will usually match nothing)
    #[default]
    PassThrough,
    /// Drop the token as if the field had not been sent
    Ignore,
}

/// Values meaning "no constraint"
const ANY_SENTINELS: &[&str] = &["", "any", "all", "no_preference", "doesnt_matter", "open_to_all"];

const BODY_TYPES: &[&str] = &["slim", "athletic", "average", "curvy", "muscular", "heavyset"];
const ETHNICITIES: &[&str] = &[
    "asian",
    "black",
    "hispanic_latino",
    "middle_eastern",
    "native_american",
    "pacific_islander",
    "south_asian",
    "white",
    "multiracial",
    "other",
];
const RELIGIONS: &[&str] = &[
    "agnostic", "atheist", "buddhist", "catholic", "christian", "hindu", "jewish", "muslim",
    "spiritual", "other",
];
const EDUCATION: &[&str] = &[
    "high_school",
    "trade_school",
    "some_college",
    "associates",
    "bachelors",
    "masters",
    "doctorate",
];
const DRINKING: &[&str] = &["never", "rarely", "socially", "regularly"];
const SMOKING: &[&str] = &["never", "occasionally", "regularly"];
const MARIJUANA: &[&str] = &["never", "occasionally", "regularly"];
const HAVE_CHILDREN: &[&str] = &["yes", "no"];
const WANT_CHILDREN: &[&str] = &["yes", "no", "maybe"];
const ZODIAC: &[&str] = &[
    "aries", "taurus", "gemini", "cancer", "leo", "virgo", "libra", "scorpio", "sagittarius",
    "capricorn", "aquarius", "pisces",
];

const ALIASES: &[(&str, &str)] = &[
    ("hispanic", "hispanic_latino"),
    ("latino", "hispanic_latino"),
    ("latina", "hispanic_latino"),
    ("bachelor", "bachelors"),
    ("master", "masters"),
    ("phd", "doctorate"),
    ("sometimes", "occasionally"),
    ("social", "socially"),
];

/// Token vocabulary of an enumerated filter field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    BodyType,
    Ethnicity,
    Religion,
    Education,
    Drinking,
    Smoking,
    Marijuana,
    HaveChildren,
    WantChildren,
    Zodiac,
}

impl Field {
    fn vocabulary(self) -> &'static [&'static str] {
        match self {
            Field::BodyType => BODY_TYPES,
            Field::Ethnicity => ETHNICITIES,
            Field::Religion => RELIGIONS,
            Field::Education => EDUCATION,
            Field::Drinking => DRINKING,
            Field::Smoking => SMOKING,
            Field::Marijuana => MARIJUANA,
            Field::HaveChildren => HAVE_CHILDREN,
            Field::WantChildren => WANT_CHILDREN,
            Field::Zodiac => ZODIAC,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Field::BodyType => "body_type",
            Field::Ethnicity => "ethnicity",
            Field::Religion => "religion",
            Field::Education => "education",
            Field::Drinking => "drinking",
            Field::Smoking => "smoking",
            Field::Marijuana => "marijuana",
            Field::HaveChildren => "have_children",
            Field::WantChildren => "want_children",
            Field::Zodiac => "zodiac",
        }
    }
}

/// Canonical, typed filter. `None` on any field means "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveryFilter {
    pub min_age: Option<u32>,
    pub max_age: Option<u32>,
    pub min_height_inches: Option<i32>,
    pub max_height_inches: Option<i32>,
    pub body_type: Option<String>,
    pub ethnicity: Option<BTreeSet<String>>,
    pub religion: Option<String>,
    pub education: Option<String>,
    pub drinking: Option<String>,
    pub smoking: Option<String>,
    pub marijuana: Option<String>,
    pub have_children: Option<String>,
    pub want_children: Option<String>,
    pub zodiac: Option<BTreeSet<String>>,
    pub max_distance_km: Option<f64>,
}

impl DiscoveryFilter {
    /// Check every attribute predicate against a profile.
    ///
    /// Distance is evaluated separately because it needs the requester's
    /// coordinates. A profile missing an attribute that a filter constrains
    /// does not match that filter.
    pub fn matches(&self, profile: &Profile, age: Option<u32>) -> bool {
        within(age, self.min_age, self.max_age)
            && within(profile.height_inches, self.min_height_inches, self.max_height_inches)
            && token_matches(&self.body_type, &profile.body_type)
            && token_matches(&self.religion, &profile.religion)
            && token_matches(&self.education, &profile.education)
            && token_matches(&self.drinking, &profile.drinking)
            && token_matches(&self.smoking, &profile.smoking)
            && token_matches(&self.marijuana, &profile.marijuana)
            && token_matches(&self.have_children, &profile.have_children)
            && token_matches(&self.want_children, &profile.want_children)
            && set_intersects(&self.ethnicity, &profile.ethnicity)
            && set_contains(&self.zodiac, &profile.zodiac)
    }

    /// Number of constrained fields, for logging
    pub fn active_count(&self) -> usize {
        [
            self.min_age.is_some(),
            self.max_age.is_some(),
            self.min_height_inches.is_some(),
            self.max_height_inches.is_some(),
            self.body_type.is_some(),
            self.ethnicity.is_some(),
            self.religion.is_some(),
            self.education.is_some(),
            self.drinking.is_some(),
            self.smoking.is_some(),
            self.marijuana.is_some(),
            self.have_children.is_some(),
            self.want_children.is_some(),
            self.zodiac.is_some(),
            self.max_distance_km.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

/// Turns raw filter overrides into a [`DiscoveryFilter`]. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterNormalizer {
    policy: UnknownTokenPolicy,
    distance_unit: DistanceUnit,
}

impl FilterNormalizer {
    pub fn new(policy: UnknownTokenPolicy, distance_unit: DistanceUnit) -> Self {
        Self { policy, distance_unit }
    }

    pub fn normalize(&self, raw: &RawFilters) -> DiscoveryFilter {
        let (min_age, max_age) = ordered(
            raw.min_age.as_deref().and_then(parse_age),
            raw.max_age.as_deref().and_then(parse_age),
        );
        let (min_height_inches, max_height_inches) = ordered(
            raw.min_height.as_deref().and_then(feet_to_inches),
            raw.max_height.as_deref().and_then(feet_to_inches),
        );
        let max_distance_km = raw
            .max_distance
            .as_deref()
            .and_then(parse_number)
            .filter(|d| *d > 0.0)
            .map(|d| self.distance_unit.to_km(d));

        DiscoveryFilter {
            min_age,
            max_age,
            min_height_inches,
            max_height_inches,
            body_type: self.token(Field::BodyType, raw.body_type.as_deref()),
            ethnicity: self.token_set(Field::Ethnicity, raw.ethnicity.as_deref()),
            religion: self.token(Field::Religion, raw.religion.as_deref()),
            education: self.token(Field::Education, raw.education.as_deref()),
            drinking: self.token(Field::Drinking, raw.drinks.as_deref()),
            smoking: self.token(Field::Smoking, raw.smoke.as_deref()),
            marijuana: self.token(Field::Marijuana, raw.marijuana.as_deref()),
            have_children: self.token(Field::HaveChildren, raw.have_child.as_deref()),
            want_children: self.token(Field::WantChildren, raw.want_child.as_deref()),
            zodiac: self.token_set(Field::Zodiac, raw.zodiac.as_deref()),
            max_distance_km,
        }
    }

    fn token(&self, field: Field, raw: Option<&str>) -> Option<String> {
        match self.resolve(field, raw?) {
            Resolved::Token(token) => Some(token),
            Resolved::Any | Resolved::Dropped => None,
        }
    }

    fn token_set(&self, field: Field, raw: Option<&str>) -> Option<BTreeSet<String>> {
        let mut tokens = BTreeSet::new();
        for part in raw?.split(',') {
            if part.trim().is_empty() {
                continue;
            }
            match self.resolve(field, part) {
                Resolved::Token(token) => {
                    tokens.insert(token);
                }
                // "any" anywhere in the list lifts the whole constraint
                Resolved::Any => return None,
                Resolved::Dropped => {}
            }
        }
        (!tokens.is_empty()).then_some(tokens)
    }

    fn resolve(&self, field: Field, raw: &str) -> Resolved {
        let token = canonical_token(raw);
        if ANY_SENTINELS.contains(&token.as_str()) {
            return Resolved::Any;
        }
        if field.vocabulary().contains(&token.as_str()) {
            return Resolved::Token(token);
        }
        if let Some((_, target)) = ALIASES
            .iter()
            .find(|(alias, target)| *alias == token && field.vocabulary().contains(target))
        {
            return Resolved::Token((*target).to_string());
        }

        match self.policy {
            UnknownTokenPolicy::PassThrough => {
                tracing::debug!("Passing through unrecognized {} token: {}", field.name(), token);
                Resolved::Token(token)
            }
            UnknownTokenPolicy::Ignore => {
                tracing::debug!("Ignoring unrecognized {} token: {}", field.name(), token);
                Resolved::Dropped
            }
        }
    }
}

enum Resolved {
    Token(String),
    Any,
    Dropped,
}

/// Lowercase, trim, and fold spaces/hyphens into single underscores
pub fn canonical_token(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        match ch {
            ' ' | '-' | '_' => {
                if !out.is_empty() && !out.ends_with('_') {
                    out.push('_');
                }
            }
            '\'' | '\u{2019}' => {}
            c => out.extend(c.to_lowercase()),
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_age(raw: &str) -> Option<u32> {
    let age = parse_number(raw)?.round();
    (0.0..=150.0).contains(&age).then_some(age as u32)
}

/// Feet (possibly fractional) to whole inches
fn feet_to_inches(raw: &str) -> Option<i32> {
    let feet = parse_number(raw).filter(|f| *f > 0.0 && *f < 10.0)?;
    Some((feet * 12.0).round() as i32)
}

fn ordered<T: PartialOrd>(min: Option<T>, max: Option<T>) -> (Option<T>, Option<T>) {
    match (min, max) {
        (Some(lo), Some(hi)) if lo > hi => (Some(hi), Some(lo)),
        other => other,
    }
}

#[inline]
fn within<T: PartialOrd>(value: Option<T>, min: Option<T>, max: Option<T>) -> bool {
    if min.is_none() && max.is_none() {
        return true;
    }
    let Some(value) = value else {
        return false;
    };
    min.map_or(true, |lo| value >= lo) && max.map_or(true, |hi| value <= hi)
}

#[inline]
fn token_matches(filter: &Option<String>, value: &Option<String>) -> bool {
    match (filter, value) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(wanted), Some(actual)) => canonical_token(actual) == *wanted,
    }
}

#[inline]
fn set_intersects(filter: &Option<BTreeSet<String>>, values: &[String]) -> bool {
    match filter {
        None => true,
        Some(wanted) => values.iter().any(|v| wanted.contains(&canonical_token(v))),
    }
}

#[inline]
fn set_contains(filter: &Option<BTreeSet<String>>, value: &Option<String>) -> bool {
    match (filter, value) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(wanted), Some(actual)) => wanted.contains(&canonical_token(actual)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(f: impl FnOnce(&mut RawFilters)) -> RawFilters {
        let mut filters = RawFilters::default();
        f(&mut filters);
        filters
    }

    fn normalizer() -> FilterNormalizer {
        FilterNormalizer::default()
    }

    #[test]
    fn test_empty_input_is_unconstrained() {
        let filter = normalizer().normalize(&RawFilters::default());
        assert_eq!(filter, DiscoveryFilter::default());
        assert_eq!(filter.active_count(), 0);
    }

    #[test]
    fn test_age_bounds_parsed_and_swapped() {
        let filter = normalizer().normalize(&raw(|r| {
            r.min_age = Some("35".to_string());
            r.max_age = Some(" 25 ".to_string());
        }));
        assert_eq!(filter.min_age, Some(25));
        assert_eq!(filter.max_age, Some(35));
    }

    #[test]
    fn test_garbage_numbers_become_unset() {
        let filter = normalizer().normalize(&raw(|r| {
            r.min_age = Some("twenty".to_string());
            r.max_height = Some("NaN".to_string());
            r.max_distance = Some("-5".to_string());
        }));
        assert_eq!(filter.min_age, None);
        assert_eq!(filter.max_height_inches, None);
        assert_eq!(filter.max_distance_km, None);
    }

    #[test]
    fn test_height_feet_to_inches() {
        let filter = normalizer().normalize(&raw(|r| {
            r.min_height = Some("5".to_string());
            r.max_height = Some("6.5".to_string());
        }));
        assert_eq!(filter.min_height_inches, Some(60));
        assert_eq!(filter.max_height_inches, Some(78));
    }

    #[test]
    fn test_enum_case_normalized() {
        let filter = normalizer().normalize(&raw(|r| {
            r.body_type = Some("Athletic".to_string());
            r.education = Some("High School".to_string());
            r.drinks = Some("Social".to_string());
        }));
        assert_eq!(filter.body_type.as_deref(), Some("athletic"));
        assert_eq!(filter.education.as_deref(), Some("high_school"));
        assert_eq!(filter.drinking.as_deref(), Some("socially"));
    }

    #[test]
    fn test_any_sentinel_unsets() {
        let filter = normalizer().normalize(&raw(|r| {
            r.religion = Some("Any".to_string());
            r.smoke = Some("Doesn't matter".to_string());
            r.zodiac = Some("leo, any".to_string());
        }));
        assert_eq!(filter.religion, None);
        assert_eq!(filter.smoking, None);
        assert_eq!(filter.zodiac, None);
    }

    #[test]
    fn test_multi_valued_split() {
        let filter = normalizer().normalize(&raw(|r| {
            r.ethnicity = Some("Asian, White,,".to_string());
            r.zodiac = Some(" , ".to_string());
        }));
        let ethnicity = filter.ethnicity.unwrap();
        assert_eq!(ethnicity.len(), 2);
        assert!(ethnicity.contains("asian") && ethnicity.contains("white"));
        assert_eq!(filter.zodiac, None);
    }

    #[test]
    fn test_unknown_token_pass_through() {
        let filter = normalizer().normalize(&raw(|r| r.body_type = Some("Athletik".to_string())));
        assert_eq!(filter.body_type.as_deref(), Some("athletik"));
    }

    #[test]
    fn test_unknown_token_ignored() {
        let normalizer = FilterNormalizer::new(UnknownTokenPolicy::Ignore, DistanceUnit::Km);
        let filter = normalizer.normalize(&raw(|r| {
            r.body_type = Some("Athletik".to_string());
            r.ethnicity = Some("martian,asian".to_string());
            r.zodiac = Some("ophiuchus".to_string());
        }));
        assert_eq!(filter.body_type, None);
        assert_eq!(filter.ethnicity.unwrap().into_iter().collect::<Vec<_>>(), vec!["asian"]);
        assert_eq!(filter.zodiac, None);
    }

    #[test]
    fn test_max_distance_in_miles() {
        let normalizer = FilterNormalizer::new(UnknownTokenPolicy::PassThrough, DistanceUnit::Miles);
        let filter = normalizer.normalize(&raw(|r| r.max_distance = Some("10".to_string())));
        assert!((filter.max_distance_km.unwrap() - 16.09344).abs() < 1e-9);
    }

    #[test]
    fn test_canonical_token() {
        assert_eq!(canonical_token("  Middle - Eastern "), "middle_eastern");
        assert_eq!(canonical_token("Doesn't  Matter"), "doesnt_matter");
        assert_eq!(canonical_token("LEO"), "leo");
    }

    #[test]
    fn test_within_bounds() {
        assert!(within(Some(30), Some(25), Some(35)));
        assert!(!within(Some(40), Some(25), Some(35)));
        assert!(!within(None::<u32>, Some(25), None));
        assert!(within(None::<u32>, None, None));
    }
}
