use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// Raw filter overrides as they arrive on the query string or from the
/// persisted filter preference document.
///
/// Every field is kept as an optional string; typing happens in the
/// normalizer so a malformed value can never reject the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFilters {
    #[serde(default, deserialize_with = "lenient_string")]
    pub min_age: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub max_age: Option<String>,
    /// Feet, possibly fractional
    #[serde(default, deserialize_with = "lenient_string")]
    pub min_height: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub max_height: Option<String>,
    #[serde(rename = "BodyType", alias = "body_type", default, deserialize_with = "lenient_string")]
    pub body_type: Option<String>,
    #[serde(rename = "Ethnicity", alias = "ethnicity", default, deserialize_with = "lenient_string")]
    pub ethnicity: Option<String>,
    #[serde(rename = "Drinks", alias = "drinks", default, deserialize_with = "lenient_string")]
    pub drinks: Option<String>,
    #[serde(rename = "Religion", alias = "religion", default, deserialize_with = "lenient_string")]
    pub religion: Option<String>,
    #[serde(rename = "Education", alias = "education", default, deserialize_with = "lenient_string")]
    pub education: Option<String>,
    #[serde(rename = "HaveChild", alias = "have_child", default, deserialize_with = "lenient_string")]
    pub have_child: Option<String>,
    #[serde(rename = "WantChild", alias = "want_child", default, deserialize_with = "lenient_string")]
    pub want_child: Option<String>,
    /// Zodiac ("horoscope sign")
    #[serde(rename = "Hsign", alias = "zodiac", default, deserialize_with = "lenient_string")]
    pub zodiac: Option<String>,
    #[serde(rename = "Marijuana", alias = "marijuana", default, deserialize_with = "lenient_string")]
    pub marijuana: Option<String>,
    #[serde(rename = "Smoke", alias = "smoke", default, deserialize_with = "lenient_string")]
    pub smoke: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub max_distance: Option<String>,
}

impl RawFilters {
    /// Layer `overrides` on top of `self`; any field present in `overrides`
    /// wins, including "any" sentinels that clear a persisted value.
    pub fn overlay(self, overrides: RawFilters) -> RawFilters {
        RawFilters {
            min_age: overrides.min_age.or(self.min_age),
            max_age: overrides.max_age.or(self.max_age),
            min_height: overrides.min_height.or(self.min_height),
            max_height: overrides.max_height.or(self.max_height),
            body_type: overrides.body_type.or(self.body_type),
            ethnicity: overrides.ethnicity.or(self.ethnicity),
            drinks: overrides.drinks.or(self.drinks),
            religion: overrides.religion.or(self.religion),
            education: overrides.education.or(self.education),
            have_child: overrides.have_child.or(self.have_child),
            want_child: overrides.want_child.or(self.want_child),
            zodiac: overrides.zodiac.or(self.zodiac),
            marijuana: overrides.marijuana.or(self.marijuana),
            smoke: overrides.smoke.or(self.smoke),
            max_distance: overrides.max_distance.or(self.max_distance),
        }
    }
}

/// Paging and ordering parameters of a discovery request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageParams {
    #[serde(default, deserialize_with = "lenient_string")]
    pub offset: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub limit: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sort: Option<String>,
}

impl PageParams {
    pub fn offset(&self) -> Option<usize> {
        self.offset.as_deref().and_then(|v| v.trim().parse().ok())
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit.as_deref().and_then(|v| v.trim().parse().ok())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientScalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Other(IgnoredAny),
}

impl LenientScalar {
    fn into_text(self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Other(_) => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientValue {
    List(Vec<LenientScalar>),
    Scalar(LenientScalar),
}

/// Accept strings, numbers or lists of them and keep them as text.
///
/// Anything else (objects, nested lists) reads as unset so one bad field
/// in a saved document never discards the rest.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LenientValue>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        LenientValue::Scalar(scalar) => scalar.into_text(),
        LenientValue::List(items) => {
            let items: Vec<String> = items.into_iter().filter_map(LenientScalar::into_text).collect();
            (!items.is_empty()).then(|| items.join(","))
        }
    }))
}
