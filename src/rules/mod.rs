//! Ordered pattern rules that turn concatenated key literals into factory calls.
//!
//! A [`Rule`] pairs a regex matcher with a replacement template. Rules are
//! grouped into a [`RuleSet`] whose order is significant: the engine applies
//! each rule to the output of the previous one, so an earlier rule consumes
//! text before a later rule can see it.
//!
//! The `regex` crate has no lookaround, so exclusions that keep a rule away
//! from ambiguous call sites are modelled as separate [`Exclusion`] guards.
//! A guard is tested against the text around the *maximal* match and never
//! makes the matcher settle for a shorter capture.

pub mod builtin;
pub mod config;

pub use config::{ExclusionSpec, RuleSetConfig, RuleSpec};

use crate::error::{MigrateError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// A guard that vetoes an otherwise valid match based on its surroundings.
#[derive(Debug, Clone)]
pub struct Exclusion {
    spec: ExclusionSpec,
    regex: Regex,
}

impl Exclusion {
    /// Skips matches immediately followed by text matching `pattern`.
    pub fn not_followed_by(pattern: &str) -> Result<Self> {
        Self::from_spec(ExclusionSpec::NotFollowedBy(pattern.to_string()))
    }

    /// Skips matches immediately preceded by text matching `pattern`.
    ///
    /// Only the part of the match's own line before the match is examined,
    /// so a guard cannot see previous lines.
    pub fn not_preceded_by(pattern: &str) -> Result<Self> {
        Self::from_spec(ExclusionSpec::NotPrecededBy(pattern.to_string()))
    }

    /// Compiles a serializable exclusion.
    pub fn from_spec(spec: ExclusionSpec) -> Result<Self> {
        let anchored = match &spec {
            ExclusionSpec::NotFollowedBy(p) => format!("^(?:{p})"),
            ExclusionSpec::NotPrecededBy(p) => format!("(?:{p})$"),
        };
        Ok(Self {
            regex: Regex::new(&anchored)?,
            spec,
        })
    }

    /// Returns true if the match spanning `start..end` of `text` must be left alone.
    pub fn excludes(&self, text: &str, start: usize, end: usize) -> bool {
        match self.spec {
            ExclusionSpec::NotFollowedBy(_) => self.regex.is_match(&text[end..]),
            ExclusionSpec::NotPrecededBy(_) => {
                let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
                self.regex.is_match(&text[line_start..start])
            }
        }
    }

    /// Returns the serializable form of this exclusion.
    pub fn spec(&self) -> &ExclusionSpec {
        &self.spec
    }

    /// Returns a description of the exclusion.
    pub fn describe(&self) -> String {
        match &self.spec {
            ExclusionSpec::NotFollowedBy(p) => format!("unless followed by '{p}'"),
            ExclusionSpec::NotPrecededBy(p) => format!("unless preceded by '{p}'"),
        }
    }
}

/// One textual substitution: a matcher, a template, and optional guards.
///
/// Identity is positional. Two rules with the same matcher but different
/// call shapes stay separate entries in the table.
#[derive(Debug, Clone)]
pub struct Rule {
    matcher: Regex,
    template: String,
    exclusions: Vec<Exclusion>,
}

impl Rule {
    /// Creates a rule from a regex pattern and a replacement template.
    ///
    /// The template uses the regex crate's expansion syntax (`$1`, `${1}`,
    /// `${name}`, `$$` for a literal dollar sign).
    pub fn new(pattern: &str, template: impl Into<String>) -> Result<Self> {
        if pattern.is_empty() {
            return Err(invalid_rule("matcher is empty"));
        }
        let matcher = Regex::new(pattern)?;
        if matcher.is_match("") {
            return Err(invalid_rule(format!(
                "matcher '{pattern}' matches the empty string"
            )));
        }
        Ok(Self {
            matcher,
            template: template.into(),
            exclusions: Vec::new(),
        })
    }

    /// Adds a guard to this rule.
    pub fn with_exclusion(mut self, exclusion: Exclusion) -> Self {
        self.exclusions.push(exclusion);
        self
    }

    /// Compiles a serializable rule.
    pub fn from_spec(spec: &RuleSpec) -> Result<Self> {
        let mut rule = Self::new(&spec.pattern, spec.template.clone())?;
        for exclusion in &spec.exclusions {
            rule = rule.with_exclusion(Exclusion::from_spec(exclusion.clone())?);
        }
        Ok(rule)
    }

    /// Returns the serializable form of this rule.
    pub fn to_spec(&self) -> RuleSpec {
        RuleSpec {
            pattern: self.matcher.as_str().to_string(),
            template: self.template.clone(),
            exclusions: self.exclusions.iter().map(|e| e.spec().clone()).collect(),
        }
    }

    pub fn matcher(&self) -> &Regex {
        &self.matcher
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn exclusions(&self) -> &[Exclusion] {
        &self.exclusions
    }

    /// Returns true if any guard vetoes the match spanning `start..end`.
    pub fn is_excluded(&self, text: &str, start: usize, end: usize) -> bool {
        self.exclusions.iter().any(|e| e.excludes(text, start, end))
    }

    /// Returns a description of the rule.
    pub fn describe(&self) -> String {
        let mut out = format!(
            "Replace '{}' with '{}'",
            self.matcher.as_str(),
            self.template
        );
        for exclusion in &self.exclusions {
            out.push(' ');
            out.push_str(&exclusion.describe());
        }
        out
    }

    /// Renders the template with every capture reference filled by `sample`.
    fn sample_output(&self, sample: &str) -> String {
        static CAPTURE_REF: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"\$\$|\$\{[^}]*\}|\$[_0-9A-Za-z]+").expect("valid capture reference regex")
        });
        CAPTURE_REF
            .replace_all(&self.template, |caps: &regex::Captures| {
                if &caps[0] == "$$" {
                    "$".to_string()
                } else {
                    sample.to_string()
                }
            })
            .into_owned()
    }
}

fn invalid_rule(message: impl Into<String>) -> MigrateError {
    MigrateError::InvalidRule {
        index: 0,
        message: message.into(),
    }
}

/// An ordered, immutable table of rules plus the notices a run should print
/// for the key shapes the table deliberately leaves for manual handling.
#[derive(Debug, Clone)]
pub struct RuleSet {
    name: String,
    description: String,
    rules: Vec<Rule>,
    manual_notes: Vec<String>,
}

impl RuleSet {
    /// Starts building a rule set with the given name.
    pub fn builder(name: impl Into<String>) -> RuleSetBuilder {
        RuleSetBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the rules in application order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Returns the "manual follow-up required" notices for this table.
    pub fn manual_notes(&self) -> &[String] {
        &self.manual_notes
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns descriptions of all rules, in order.
    pub fn describe(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.describe()).collect()
    }

    /// Finds rules whose template output would be matched again by some rule.
    ///
    /// Each template is rendered with `sample` substituted for its captures and
    /// checked against every matcher. A hit `(producer, consumer)` means a
    /// second pass over migrated text is not guaranteed to be a no-op.
    pub fn template_conflicts(&self, sample: &str) -> Vec<(usize, usize)> {
        let mut conflicts = Vec::new();
        for (producer, rule) in self.rules.iter().enumerate() {
            let output = rule.sample_output(sample);
            for (consumer, other) in self.rules.iter().enumerate() {
                if other.matcher.is_match(&output) {
                    conflicts.push((producer, consumer));
                }
            }
        }
        conflicts
    }

    /// Returns the serializable form of this rule set.
    pub fn to_config(&self) -> RuleSetConfig {
        RuleSetConfig {
            name: self.name.clone(),
            description: self.description.clone(),
            manual_notes: self.manual_notes.clone(),
            rules: self.rules.iter().map(Rule::to_spec).collect(),
        }
    }
}

/// Builder for [`RuleSet`]. Patterns are compiled in [`RuleSetBuilder::build`].
pub struct RuleSetBuilder {
    name: String,
    description: String,
    specs: Vec<RuleSpec>,
    manual_notes: Vec<String>,
}

impl RuleSetBuilder {
    /// Creates an empty builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            specs: Vec::new(),
            manual_notes: Vec::new(),
        }
    }

    /// Sets the human-readable description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends an unguarded rule.
    pub fn rule(self, pattern: impl Into<String>, template: impl Into<String>) -> Self {
        self.spec(RuleSpec::new(pattern, template))
    }

    /// Appends a rule that skips matches followed by `guard`.
    pub fn rule_unless_followed_by(
        self,
        pattern: impl Into<String>,
        template: impl Into<String>,
        guard: impl Into<String>,
    ) -> Self {
        self.spec(
            RuleSpec::new(pattern, template)
                .exclude(ExclusionSpec::NotFollowedBy(guard.into())),
        )
    }

    /// Appends a rule that skips matches preceded by `guard`.
    pub fn rule_unless_preceded_by(
        self,
        pattern: impl Into<String>,
        template: impl Into<String>,
        guard: impl Into<String>,
    ) -> Self {
        self.spec(
            RuleSpec::new(pattern, template)
                .exclude(ExclusionSpec::NotPrecededBy(guard.into())),
        )
    }

    /// Appends a rule given in serializable form.
    pub fn spec(mut self, spec: RuleSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Adds a notice printed after every run of this rule set.
    pub fn manual_note(mut self, note: impl Into<String>) -> Self {
        self.manual_notes.push(note.into());
        self
    }

    /// Compiles every rule. Errors name the position of the offending rule.
    pub fn build(self) -> Result<RuleSet> {
        let rules = self
            .specs
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                Rule::from_spec(spec).map_err(|e| match e {
                    MigrateError::InvalidRule { message, .. } => {
                        MigrateError::InvalidRule { index, message }
                    }
                    MigrateError::Regex(err) => MigrateError::InvalidRule {
                        index,
                        message: err.to_string(),
                    },
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(RuleSet {
            name: self.name,
            description: self.description,
            rules,
            manual_notes: self.manual_notes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_rejects_empty_matcher() {
        assert!(matches!(
            Rule::new("", "x"),
            Err(MigrateError::InvalidRule { .. })
        ));
        assert!(matches!(
            Rule::new(r"\w*", "x"),
            Err(MigrateError::InvalidRule { .. })
        ));
    }

    #[test]
    fn test_not_followed_by_checks_text_after_match() {
        let exclusion = Exclusion::not_followed_by(r"\s*\|\|").unwrap();
        let text = r#"a("K_" + x) || b"#;
        let end = text.find(')').unwrap() + 1;
        assert!(exclusion.excludes(text, 2, end));
        assert!(!exclusion.excludes(r#"a("K_" + x);"#, 2, end));
    }

    #[test]
    fn test_not_preceded_by_checks_text_before_match() {
        let exclusion = Exclusion::not_preceded_by(r"legacy\(").unwrap();
        let text = r#"legacy("K_" + x)"#;
        assert!(exclusion.excludes(text, 7, 15));
        assert!(!exclusion.excludes(r#"modern("K_" + x)"#, 7, 15));
    }

    #[test]
    fn test_not_preceded_by_sees_current_line_only() {
        let exclusion = Exclusion::not_preceded_by(r"legacy\([^\n]*").unwrap();
        let text = "legacy(\nf(\"K_\" + x)";
        let start = text.find('"').unwrap();
        assert!(!exclusion.excludes(text, start, text.len()));

        let text = "legacy(a, f(\"K_\" + x))";
        let start = text.find('"').unwrap();
        assert!(exclusion.excludes(text, start, text.len()));
    }

    #[test]
    fn test_rule_unless_preceded_by() {
        let set = RuleSet::builder("skip-legacy")
            .rule_unless_preceded_by(r#""K_" \+ (\w+)"#, "Keys.kK($1)", r"legacyTag\(")
            .build()
            .unwrap();

        let rule = &set.rules()[0];
        assert_eq!(
            rule.exclusions()[0].spec(),
            &ExclusionSpec::NotPrecededBy(r"legacyTag\(".to_string())
        );

        let engine = crate::engine::RewriteEngine::new(set);
        let result = engine.rewrite("legacyTag(\"K_\" + a);\nnbt.getInteger(\"K_\" + b);");
        assert_eq!(
            result.text,
            "legacyTag(\"K_\" + a);\nnbt.getInteger(Keys.kK(b));"
        );
        assert_eq!(result.rule_hits, vec![1]);
        assert_eq!(result.rule_skips, vec![1]);
    }

    #[test]
    fn test_builder_reports_rule_index() {
        let err = RuleSet::builder("broken")
            .rule(r#""A_" \+ (\w+)"#, "k($1)")
            .rule(r"(unclosed", "x")
            .build()
            .unwrap_err();

        match err {
            MigrateError::InvalidRule { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rule_set_keeps_insertion_order() {
        let set = RuleSet::builder("ordered")
            .description("two rules")
            .rule(r#""B_" \+ (\w+)"#, "k.b($1)")
            .rule(r#""A_" \+ (\w+)"#, "k.a($1)")
            .manual_note("check by hand")
            .build()
            .unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.rules()[0].template(), "k.b($1)");
        assert_eq!(set.rules()[1].template(), "k.a($1)");
        assert_eq!(set.manual_notes(), ["check by hand"]);
        assert_eq!(set.description(), "two rules");
    }

    #[test]
    fn test_template_conflicts_detects_self_feeding_rule() {
        let set = RuleSet::builder("loop")
            .rule(r#""A_" \+ (\w+)"#, r#""A_" + $1"#)
            .build()
            .unwrap();
        assert_eq!(set.template_conflicts("id"), vec![(0, 0)]);

        let clean = RuleSet::builder("clean")
            .rule(r#""A_" \+ (\w+)"#, "Keys.kA(${1})")
            .build()
            .unwrap();
        assert!(clean.template_conflicts("id").is_empty());
    }

    #[test]
    fn test_describe_mentions_exclusions() {
        let set = RuleSet::builder("guarded")
            .rule_unless_followed_by(r#""A_" \+ (\w+)\)"#, "k($1))", r"\s*\|\|")
            .build()
            .unwrap();
        let described = set.describe();
        assert!(described[0].contains("unless followed by"));
    }
}
