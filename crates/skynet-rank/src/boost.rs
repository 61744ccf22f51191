use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use skynet_core::config::BoostRuleSettings;
use skynet_core::{Error, Result, Role};

/// Built-in rules: (role, pattern, per_match, max_matches).
const DEFAULT_RULES: &[(Role, &str, f32, usize)] = &[
    (
        Role::FundingManager,
        r"(?i)\b(?:fund(?:s|ed|ing)?|grants?|award(?:s|ed)?|sponsor(?:s|ed|ship)?|budget|investment|cost(?:s|ly)?|financial|nasa)\b",
        0.05,
        4,
    ),
    (Role::Researcher, r"\b\d+(?:\.\d+)?\b", 0.01, 10),
    (
        Role::Researcher,
        r"(?i)\b(?:method(?:s|ology)?|protocol|assay|sequencing|measured|statistical(?:ly)?|significant(?:ly)?|randomi[sz]ed|control group|sample size|quantified)\b",
        0.03,
        5,
    ),
    (
        Role::Student,
        r"(?i)\b(?:in summary|overall|for example|in other words|this means|suggests? that|we found|we show|is important|helps explain)\b",
        0.04,
        4,
    ),
];

static DEFAULT_BOOST: Lazy<FeatureBoost> = Lazy::new(|| {
    let mut boost = FeatureBoost::none();
    for &(role, pattern, per_match, max_matches) in DEFAULT_RULES {
        let rule = BoostRule::new(pattern, per_match, max_matches).expect("built-in boost pattern compiles");
        boost.rules.entry(role).or_default().push(rule);
    }
    boost
});

/// Counts matches of `pattern` in a chunk; each match adds `per_match`, up to `max_matches`.
#[derive(Debug, Clone)]
pub struct BoostRule {
    pattern: Regex,
    per_match: f32,
    max_matches: usize,
}

impl BoostRule {
    pub fn new(pattern: &str, per_match: f32, max_matches: usize) -> Result<Self> {
        if !per_match.is_finite() || per_match < 0.0 {
            return Err(Error::InvalidConfig(format!("boost rule '{pattern}': per_match must be >= 0, got {per_match}")));
        }
        let pattern = Regex::new(pattern).map_err(|e| Error::InvalidConfig(format!("boost rule '{pattern}': {e}")))?;
        Ok(Self { pattern, per_match, max_matches })
    }

    pub fn score(&self, text: &str) -> f32 {
        let matches = self.pattern.find_iter(text).take(self.max_matches).count();
        self.per_match * matches as f32
    }
}

/// Role-specific content boost. Always >= 0 and never decreases as a text
/// gains more matching keywords.
#[derive(Debug, Clone)]
pub struct FeatureBoost {
    rules: HashMap<Role, Vec<BoostRule>>,
}

impl FeatureBoost {
    /// No rules: every boost is 0.
    pub fn none() -> Self { Self { rules: HashMap::new() } }

    /// Built-in rules with the roles named in `configured` replaced by their configured rules.
    pub fn from_settings(configured: &HashMap<String, Vec<BoostRuleSettings>>) -> Result<Self> {
        let mut boost = Self::default();
        for (role_name, rules) in configured {
            let role = Role::parse(role_name).ok_or_else(|| Error::InvalidConfig(format!("unknown role in boost: '{role_name}'")))?;
            let compiled = rules
                .iter()
                .map(|r| BoostRule::new(&r.pattern, r.per_match, r.max_matches))
                .collect::<Result<Vec<_>>>()?;
            boost.rules.insert(role, compiled);
        }
        Ok(boost)
    }

    pub fn with_rules(mut self, role: Role, rules: Vec<BoostRule>) -> Self {
        self.rules.insert(role, rules);
        self
    }

    pub fn boost(&self, role: Role, text: &str) -> f32 {
        self.rules.get(&role).map_or(0.0, |rules| rules.iter().map(|r| r.score(text)).sum())
    }
}

impl Default for FeatureBoost {
    fn default() -> Self { DEFAULT_BOOST.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn funding_keywords_boost_funding_managers_only() {
        let b = FeatureBoost::default();
        let text = "This work was funded by NASA grant 80NSSC19K.";
        assert!(b.boost(Role::FundingManager, text) > 0.0);
        assert_eq!(b.boost(Role::Student, text), 0.0);
    }

    #[test]
    fn matches_are_capped() {
        let rule = BoostRule::new(r"\bgrant\b", 0.1, 2).unwrap();
        assert!((rule.score("grant grant grant grant") - 0.2).abs() < 1e-6);
        assert_eq!(rule.score("nothing here"), 0.0);
    }

    #[test]
    fn boost_grows_with_keyword_count() {
        let b = FeatureBoost::default();
        let one = b.boost(Role::Researcher, "the protocol was applied");
        let two = b.boost(Role::Researcher, "the protocol was applied and measured");
        assert!(two > one && one > 0.0);
    }

    #[test]
    fn invalid_rules_are_config_errors() {
        assert!(matches!(BoostRule::new("(unclosed", 0.1, 1), Err(Error::InvalidConfig(_))));
        assert!(matches!(BoostRule::new("ok", -0.1, 1), Err(Error::InvalidConfig(_))));

        let configured = HashMap::from([("Pilot".to_string(), vec![])]);
        assert!(matches!(FeatureBoost::from_settings(&configured), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn configured_role_replaces_built_in_rules() {
        let configured = HashMap::from([(
            "Student".to_string(),
            vec![BoostRuleSettings { pattern: r"(?i)\bastronaut\b".into(), per_match: 0.5, max_matches: 1 }],
        )]);
        let b = FeatureBoost::from_settings(&configured).unwrap();
        assert!((b.boost(Role::Student, "Astronaut health overall") - 0.5).abs() < 1e-6);
        assert!(b.boost(Role::FundingManager, "grant") > 0.0, "other roles keep defaults");
    }
}
