//! Turns raw query parameters into [`SanitizedParameters`] or a [`ValidationError`].
//!
//! Policy: all unknown names are reported together and all bad `include`
//! tokens are reported together, but validation stops at the first field
//! (in catalog order) that violates its rule.

use std::{collections::BTreeMap, collections::HashMap, fmt, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::catalog::{KEY, Requirement, Rule, RuleCatalog, RuleKind};

const REDACTED: &str = "<redacted>";

/// Query parameters as received on the wire, in arrival order.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RawParameters {
    pairs: Vec<(String, String)>,
}

impl RawParameters {
    /// Decode an `application/x-www-form-urlencoded` query string.
    pub fn from_query(query: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()).into_owned())
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self { pairs: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Debug for RawParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.pairs.iter().map(|(k, v)| {
                let shown = if k.trim().eq_ignore_ascii_case(KEY) { REDACTED } else { v.as_str() };
                (k.as_str(), shown)
            }))
            .finish()
    }
}

/// Validated, canonical parameters keyed by canonical name.
///
/// Every entry passed its catalog rule. Absent optional parameters are
/// simply not present; nothing is defaulted here.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizedParameters {
    values: BTreeMap<String, String>,
}

impl SanitizedParameters {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Feed the sanitized values back in as raw input.
    pub fn to_raw(&self) -> RawParameters {
        RawParameters::from_pairs(self.iter())
    }

    /// Query string with the credential masked, safe for logs and terminals.
    pub fn redacted_query(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(
                self.iter().map(|(k, v)| (k, if k == KEY { REDACTED } else { v })),
            )
            .finish()
    }

    fn insert(&mut self, name: &str, value: String) {
        self.values.insert(name.to_string(), value);
    }
}

impl fmt::Debug for SanitizedParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (k, if k == KEY { REDACTED } else { v })))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unrecognized query parameter(s): {}", .0.join(", "))]
    UnknownParameters(Vec<String>),

    #[error("Parameter '{0}' was supplied more than once")]
    DuplicateParameter(String),

    #[error("API key is required")]
    MissingApiKey,

    #[error("API key format is invalid")]
    InvalidApiKey,

    #[error("Parameter '{field}' must not be empty")]
    Empty { field: String },

    #[error("Invalid value for '{field}': expected {domain}")]
    InvalidValue { field: String, domain: String },

    #[error("Invalid value(s) for '{field}': {}; expected {domain}", .items.join(", "))]
    InvalidListItems { field: String, items: Vec<String>, domain: String },

    #[error("Parameter '{field}' is required when '{depends_on}' is '{value}'")]
    MissingDependent { field: String, depends_on: String, value: String },
}

/// Applies a [`RuleCatalog`] to raw parameters. Pure, never performs I/O.
#[derive(Debug, Clone)]
pub struct Validator {
    catalog: Arc<RuleCatalog>,
}

impl Validator {
    pub fn new(catalog: Arc<RuleCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    pub fn validate(&self, raw: &RawParameters) -> Result<SanitizedParameters, ValidationError> {
        let present = self.resolve_names(raw)?;
        let mut sanitized = SanitizedParameters::default();

        for rule in self.catalog.rules() {
            match present.get(rule.name) {
                Some(value) => {
                    let canonical = check_value(rule, value)?;
                    sanitized.insert(rule.name, canonical);
                }
                None => check_absent(rule, &sanitized)?,
            }
        }

        Ok(sanitized)
    }

    /// Map every raw name onto its canonical rule name.
    fn resolve_names<'a>(
        &self,
        raw: &'a RawParameters,
    ) -> Result<HashMap<&'static str, &'a str>, ValidationError> {
        let unknown: Vec<String> = raw
            .iter()
            .filter(|(name, _)| self.catalog.lookup(name).is_none())
            .map(|(name, _)| name.to_string())
            .collect();
        if !unknown.is_empty() {
            return Err(ValidationError::UnknownParameters(unknown));
        }

        let mut present = HashMap::new();
        for (name, value) in raw.iter() {
            let Some(rule) = self.catalog.lookup(name) else { continue };
            if present.insert(rule.name, value).is_some() {
                return Err(ValidationError::DuplicateParameter(rule.name.to_string()));
            }
        }
        Ok(present)
    }
}

fn check_absent(rule: &Rule, sanitized: &SanitizedParameters) -> Result<(), ValidationError> {
    match &rule.requirement {
        Requirement::Optional => Ok(()),
        Requirement::Required if rule.name == KEY => Err(ValidationError::MissingApiKey),
        Requirement::Required => Err(ValidationError::Empty { field: rule.name.to_string() }),
        Requirement::RequiredWhen { field, equals } => match sanitized.get(field) {
            Some(v) if v == *equals => Err(ValidationError::MissingDependent {
                field: rule.name.to_string(),
                depends_on: field.to_string(),
                value: equals.to_string(),
            }),
            _ => Ok(()),
        },
    }
}

fn check_value(rule: &Rule, raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(if rule.name == KEY {
            ValidationError::MissingApiKey
        } else {
            ValidationError::Empty { field: rule.name.to_string() }
        });
    }

    let invalid = || {
        if rule.name == KEY {
            ValidationError::InvalidApiKey
        } else {
            ValidationError::InvalidValue { field: rule.name.to_string(), domain: rule.domain() }
        }
    };

    match &rule.kind {
        RuleKind::Enum { allowed } => allowed
            .iter()
            .find(|candidate| candidate.eq_ignore_ascii_case(value))
            .map(|candidate| candidate.to_string())
            .ok_or_else(invalid),
        RuleKind::Pattern { pattern } => {
            if pattern.is_match(value) { Ok(value.to_string()) } else { Err(invalid()) }
        }
        RuleKind::BoundedInteger { min, max } => {
            let n: i64 = value.parse().map_err(|_| invalid())?;
            if n < *min || max.is_some_and(|max| n > max) {
                return Err(invalid());
            }
            Ok(n.to_string())
        }
        RuleKind::FreeText { max_len, pattern } => {
            let fits = value.chars().count() <= *max_len;
            let matches = pattern.as_ref().is_none_or(|p| p.is_match(value));
            if fits && matches { Ok(value.to_string()) } else { Err(invalid()) }
        }
        RuleKind::List { vocabulary } => canonical_list(rule, vocabulary, value),
    }
}

/// Trim, lower-case and deduplicate (first occurrence wins) a comma list.
fn canonical_list(
    rule: &Rule,
    vocabulary: &[&str],
    value: &str,
) -> Result<String, ValidationError> {
    let mut accepted: Vec<String> = Vec::new();
    let mut rejected: Vec<String> = Vec::new();

    for token in value.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let token = token.to_lowercase();
        if !vocabulary.contains(&token.as_str()) {
            if !rejected.contains(&token) {
                rejected.push(token);
            }
        } else if !accepted.contains(&token) {
            accepted.push(token);
        }
    }

    if !rejected.is_empty() {
        return Err(ValidationError::InvalidListItems {
            field: rule.name.to_string(),
            items: rejected,
            domain: rule.domain(),
        });
    }
    if accepted.is_empty() {
        return Err(ValidationError::Empty { field: rule.name.to_string() });
    }

    Ok(accepted.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    const API_KEY: &str = "ABCDEFGHIJKLMNOPQRST1234";

    fn validator() -> Validator {
        Validator::new(Arc::new(RuleCatalog::standard().expect("catalog")))
    }

    fn validate(pairs: &[(&str, &str)]) -> Result<SanitizedParameters, ValidationError> {
        validator().validate(&RawParameters::from_pairs(pairs.iter().copied()))
    }

    fn with_key<'a>(extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        let mut pairs = vec![("key", API_KEY)];
        pairs.extend_from_slice(extra);
        pairs
    }

    #[test]
    fn unknown_names_are_all_reported() {
        let err = validate(&with_key(&[("foo", "1"), ("bar", "2")])).unwrap_err();
        assert_eq!(err, ValidationError::UnknownParameters(vec!["foo".into(), "bar".into()]));
    }

    #[test]
    fn unknown_names_win_over_missing_key() {
        let err = validate(&[("foo", "1")]).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownParameters(_)));
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = validate(&[("unitGroup", "metric")]).unwrap_err();
        assert_eq!(err, ValidationError::MissingApiKey);
        assert_eq!(err.to_string(), "API key is required");
    }

    #[test]
    fn blank_key_counts_as_missing() {
        assert_eq!(validate(&[("key", "   ")]).unwrap_err(), ValidationError::MissingApiKey);
    }

    #[test]
    fn short_or_symbolic_key_is_malformed() {
        assert_eq!(validate(&[("key", "abc123")]).unwrap_err(), ValidationError::InvalidApiKey);
        assert_eq!(
            validate(&[("key", "ABCDEFGHIJKLMNOPQRST-123")]).unwrap_err(),
            ValidationError::InvalidApiKey
        );
    }

    #[test]
    fn key_message_never_echoes_the_value() {
        let err = validate(&[("key", "secret-but-malformed")]).unwrap_err();
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn names_are_case_insensitive_and_canonicalised() {
        let out = validate(&[("KEY", API_KEY), ("UnitGroup", "US")]).unwrap();
        assert_eq!(out.get("key"), Some(API_KEY));
        assert_eq!(out.get("unitGroup"), Some("us"));
    }

    #[test]
    fn units_alias_maps_to_unit_group() {
        let out = validate(&with_key(&[("units", "uk")])).unwrap();
        assert_eq!(out.get("unitGroup"), Some("uk"));
        assert_eq!(out.get("units"), None);
    }

    #[test]
    fn same_parameter_twice_is_rejected() {
        let err = validate(&with_key(&[("units", "uk"), ("unitGroup", "us")])).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateParameter("unitGroup".into()));
    }

    #[test]
    fn csv_without_include_fails() {
        let err = validate(&with_key(&[("contentType", "csv")])).unwrap_err();
        assert!(matches!(err, ValidationError::MissingDependent { .. }));
    }

    #[test]
    fn csv_with_include_succeeds() {
        let out = validate(&with_key(&[("contentType", "CSV"), ("include", "days")])).unwrap();
        assert_eq!(out.get("contentType"), Some("csv"));
        assert_eq!(out.get("include"), Some("days"));
    }

    #[test]
    fn json_without_include_is_fine() {
        let out = validate(&with_key(&[("contentType", "json")])).unwrap();
        assert_eq!(out.get("include"), None);
    }

    #[test]
    fn include_is_trimmed_lowercased_and_deduplicated() {
        let out = validate(&with_key(&[("include", "Days, Hours ,days")])).unwrap();
        assert_eq!(out.get("include"), Some("days,hours"));
    }

    #[test]
    fn include_reports_every_bad_token() {
        let err = validate(&with_key(&[("include", "days,weekly,monthly")])).unwrap_err();
        match err {
            ValidationError::InvalidListItems { field, items, .. } => {
                assert_eq!(field, "include");
                assert_eq!(items, vec!["weekly".to_string(), "monthly".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn include_of_only_commas_is_empty() {
        let err = validate(&with_key(&[("include", " , ,")])).unwrap_err();
        assert_eq!(err, ValidationError::Empty { field: "include".into() });
    }

    #[test]
    fn max_distance_bounds() {
        assert!(validate(&with_key(&[("maxDistance", "-1")])).is_err());
        let out = validate(&with_key(&[("maxDistance", "0")])).unwrap();
        assert_eq!(out.get("maxDistance"), Some("0"));
    }

    #[test]
    fn max_stations_must_be_positive() {
        assert!(validate(&with_key(&[("maxStations", "0")])).is_err());
        assert!(validate(&with_key(&[("maxStations", "three")])).is_err());
        let out = validate(&with_key(&[("maxStations", "007")])).unwrap();
        assert_eq!(out.get("maxStations"), Some("7"));
    }

    #[test]
    fn timezone_membership() {
        let err = validate(&with_key(&[("timezone", "Mars/Phobos")])).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::InvalidValue { ref field, .. } if field == "timezone"
        ));

        let out = validate(&with_key(&[("timezone", "Europe/London")])).unwrap();
        assert_eq!(out.get("timezone"), Some("Europe/London"));

        let out = validate(&with_key(&[("timezone", "europe/london")])).unwrap();
        assert_eq!(out.get("timezone"), Some("Europe/London"));
    }

    #[test]
    fn enum_error_names_the_accepted_domain() {
        let err = validate(&with_key(&[("lang", "xx")])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("'lang'"));
        assert!(msg.contains("en"));
    }

    #[test]
    fn location_names_restricted_charset_and_length() {
        assert!(validate(&with_key(&[("locationNames", "London, UK")])).is_ok());
        assert!(validate(&with_key(&[("locationNames", "<script>")])).is_err());
        let long = "a".repeat(201);
        assert!(validate(&with_key(&[("locationNames", long.as_str())])).is_err());
    }

    #[test]
    fn elements_length_limit() {
        let ok = "x".repeat(500);
        let too_long = "x".repeat(501);
        assert!(validate(&with_key(&[("elements", ok.as_str())])).is_ok());
        assert!(validate(&with_key(&[("elements", too_long.as_str())])).is_err());
    }

    #[test]
    fn empty_optional_value_is_rejected() {
        let err = validate(&with_key(&[("lang", "")])).unwrap_err();
        assert_eq!(err, ValidationError::Empty { field: "lang".into() });
    }

    #[test]
    fn absent_optionals_are_not_defaulted() {
        let out = validate(&with_key(&[])).unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn revalidating_sanitized_output_is_identity() {
        let first = validate(&with_key(&[
            ("units", "METRIC"),
            ("contentType", "csv"),
            ("include", " hours,Days,hours "),
            ("timezone", "asia/tokyo"),
            ("maxDistance", "+50"),
            ("locationNames", " Paris "),
        ]))
        .unwrap();
        let second = validator().validate(&first.to_raw()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn debug_output_redacts_key() {
        let raw = RawParameters::from_pairs([("Key", API_KEY), ("lang", "en")]);
        assert!(!format!("{raw:?}").contains(API_KEY));

        let out = validate(&with_key(&[("lang", "en")])).unwrap();
        assert!(!format!("{out:?}").contains(API_KEY));
        assert!(!out.redacted_query().contains(API_KEY));
        assert!(out.redacted_query().contains("lang=en"));
    }

    #[test]
    fn from_query_decodes_percent_and_plus() {
        let raw = RawParameters::from_query("locationNames=New+York%2C%20US&lang=en");
        let pairs: Vec<_> = raw.iter().collect();
        assert_eq!(pairs, vec![("locationNames", "New York, US"), ("lang", "en")]);
    }
}
