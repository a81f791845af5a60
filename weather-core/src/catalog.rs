//! Closed set of query parameters the gateway accepts, and how each is checked.
//!
//! The catalog is built once at startup and shared read-only (behind an `Arc`)
//! by every request. Nothing mutates it after construction.

use std::collections::HashMap;

use regex::Regex;

/// Name of the API credential parameter.
pub const KEY: &str = "key";
pub const CONTENT_TYPE: &str = "contentType";
pub const INCLUDE: &str = "include";

const UNIT_GROUPS: &[&str] = &["metric", "us", "uk", "base"];

const LANGUAGES: &[&str] = &[
    "ar", "bg", "cs", "da", "de", "el", "en", "es", "fa", "fi", "fr", "he", "hu", "it", "ja",
    "ko", "nl", "pl", "pt", "ru", "sk", "sr", "sv", "tr", "uk", "vi", "zh",
];

const CONTENT_TYPES: &[&str] = &["csv", "json"];

const INCLUDE_SECTIONS: &[&str] = &[
    "days", "hours", "minutes", "alerts", "current", "events", "obs", "remote", "fcst", "stats",
    "statsfcst",
];

const ICON_SETS: &[&str] = &["icons1", "icons2"];

const TIMEZONES: &[&str] = &[
    "Z",
    "UTC",
    "Africa/Cairo",
    "Africa/Casablanca",
    "Africa/Johannesburg",
    "Africa/Lagos",
    "Africa/Nairobi",
    "America/Anchorage",
    "America/Argentina/Buenos_Aires",
    "America/Bogota",
    "America/Chicago",
    "America/Denver",
    "America/Halifax",
    "America/Lima",
    "America/Los_Angeles",
    "America/Mexico_City",
    "America/New_York",
    "America/Phoenix",
    "America/Santiago",
    "America/Sao_Paulo",
    "America/St_Johns",
    "America/Toronto",
    "America/Vancouver",
    "Asia/Bangkok",
    "Asia/Dhaka",
    "Asia/Dubai",
    "Asia/Hong_Kong",
    "Asia/Jakarta",
    "Asia/Jerusalem",
    "Asia/Karachi",
    "Asia/Kathmandu",
    "Asia/Kolkata",
    "Asia/Manila",
    "Asia/Seoul",
    "Asia/Shanghai",
    "Asia/Singapore",
    "Asia/Taipei",
    "Asia/Tehran",
    "Asia/Tokyo",
    "Atlantic/Azores",
    "Atlantic/Reykjavik",
    "Australia/Adelaide",
    "Australia/Brisbane",
    "Australia/Melbourne",
    "Australia/Perth",
    "Australia/Sydney",
    "Europe/Amsterdam",
    "Europe/Athens",
    "Europe/Berlin",
    "Europe/Brussels",
    "Europe/Bucharest",
    "Europe/Budapest",
    "Europe/Dublin",
    "Europe/Helsinki",
    "Europe/Istanbul",
    "Europe/Kyiv",
    "Europe/Lisbon",
    "Europe/London",
    "Europe/Madrid",
    "Europe/Moscow",
    "Europe/Oslo",
    "Europe/Paris",
    "Europe/Prague",
    "Europe/Rome",
    "Europe/Stockholm",
    "Europe/Vienna",
    "Europe/Warsaw",
    "Europe/Zurich",
    "Pacific/Auckland",
    "Pacific/Fiji",
    "Pacific/Guam",
    "Pacific/Honolulu",
];

#[derive(Debug, thiserror::Error)]
#[error("invalid pattern for parameter '{field}': {source}")]
pub struct CatalogError {
    field: &'static str,
    #[source]
    source: regex::Error,
}

/// How a parameter's value is checked and canonicalised.
#[derive(Debug, Clone)]
pub enum RuleKind {
    /// Case-insensitive membership; the catalog spelling is the canonical form.
    Enum { allowed: &'static [&'static str] },
    /// Whole-value regular expression match.
    Pattern { pattern: Regex },
    /// Integer parse plus inclusive range check.
    BoundedInteger { min: i64, max: Option<i64> },
    /// Length limit, optionally restricted to a character pattern.
    FreeText {
        max_len: usize,
        pattern: Option<Regex>,
    },
    /// Comma-separated list whose items come from a fixed vocabulary.
    List { vocabulary: &'static [&'static str] },
}

/// When a parameter must be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
    Optional,
    Required,
    /// Mandatory when another parameter's sanitized value equals `equals`.
    RequiredWhen {
        field: &'static str,
        equals: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub kind: RuleKind,
    pub requirement: Requirement,
}

impl Rule {
    fn new(name: &'static str, kind: RuleKind) -> Self {
        Self { name, aliases: &[], kind, requirement: Requirement::Optional }
    }

    fn aliases(mut self, aliases: &'static [&'static str]) -> Self {
        self.aliases = aliases;
        self
    }

    fn requirement(mut self, requirement: Requirement) -> Self {
        self.requirement = requirement;
        self
    }

    /// Human description of the accepted domain, used in error messages.
    pub fn domain(&self) -> String {
        match &self.kind {
            RuleKind::Enum { allowed } => format!("one of: {}", allowed.join(", ")),
            RuleKind::Pattern { pattern } => format!("a value matching {}", pattern.as_str()),
            RuleKind::BoundedInteger { min, max: Some(max) } => {
                format!("an integer between {min} and {max}")
            }
            RuleKind::BoundedInteger { min, max: None } => format!("an integer >= {min}"),
            RuleKind::FreeText { max_len, pattern: Some(p) } => {
                format!("at most {max_len} characters matching {}", p.as_str())
            }
            RuleKind::FreeText { max_len, pattern: None } => {
                format!("at most {max_len} characters")
            }
            RuleKind::List { vocabulary } => {
                format!("a comma-separated list of: {}", vocabulary.join(", "))
            }
        }
    }
}

/// Immutable table of recognised parameters, in evaluation order.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    rules: Vec<Rule>,
    by_name: HashMap<String, usize>,
}

impl RuleCatalog {
    /// The gateway's rule set.
    ///
    /// Order matters: `key` is checked first and `contentType` is resolved
    /// before `include`, whose requiredness depends on it.
    pub fn standard() -> Result<Self, CatalogError> {
        let rules = vec![
            Rule::new(KEY, RuleKind::Pattern { pattern: compile(KEY, r"^[A-Za-z0-9]{20,}$")? })
                .requirement(Requirement::Required),
            Rule::new("unitGroup", RuleKind::Enum { allowed: UNIT_GROUPS }).aliases(&["units"]),
            Rule::new("lang", RuleKind::Enum { allowed: LANGUAGES }),
            Rule::new(CONTENT_TYPE, RuleKind::Enum { allowed: CONTENT_TYPES }),
            Rule::new(INCLUDE, RuleKind::List { vocabulary: INCLUDE_SECTIONS }).requirement(
                Requirement::RequiredWhen { field: CONTENT_TYPE, equals: "csv" },
            ),
            Rule::new("timezone", RuleKind::Enum { allowed: TIMEZONES }),
            Rule::new("maxDistance", RuleKind::BoundedInteger { min: 0, max: None }),
            Rule::new("maxStations", RuleKind::BoundedInteger { min: 1, max: None }),
            Rule::new("elevationDifference", RuleKind::BoundedInteger { min: 0, max: None }),
            Rule::new("elements", RuleKind::FreeText { max_len: 500, pattern: None }),
            Rule::new(
                "locationNames",
                RuleKind::FreeText {
                    max_len: 200,
                    pattern: Some(compile("locationNames", r"^[A-Za-z0-9\s,\-]+$")?),
                },
            ),
            Rule::new("iconSet", RuleKind::Enum { allowed: ICON_SETS }),
        ];

        Ok(Self::from_rules(rules))
    }

    fn from_rules(rules: Vec<Rule>) -> Self {
        let mut by_name = HashMap::new();
        for (idx, rule) in rules.iter().enumerate() {
            by_name.insert(rule.name.to_ascii_lowercase(), idx);
            for alias in rule.aliases {
                by_name.insert(alias.to_ascii_lowercase(), idx);
            }
        }
        Self { rules, by_name }
    }

    /// Case-insensitive lookup by canonical name or alias.
    pub fn lookup(&self, name: &str) -> Option<&Rule> {
        self.by_name.get(&name.trim().to_ascii_lowercase()).map(|&idx| &self.rules[idx])
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Canonical parameter names, in evaluation order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.rules.iter().map(|r| r.name)
    }
}

fn compile(field: &'static str, pattern: &str) -> Result<Regex, CatalogError> {
    Regex::new(pattern).map_err(|source| CatalogError { field, source })
}
