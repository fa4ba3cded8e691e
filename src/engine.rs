//! Single-pass application of a [`RuleSet`] to a block of text.

use std::borrow::Cow;

use tracing::{debug, trace};

use crate::diff::{aligned_changed_lines, positional_changed_lines};
use crate::rules::{Rule, RuleSet};

/// The outcome of one rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    /// The rewritten text.
    pub text: String,
    /// Number of lines in the input.
    pub original_lines: usize,
    /// Lines that differ from the input, compared position by position.
    ///
    /// This is an approximation: if a rewrite ever changed the number of
    /// lines, every line after the first insertion or deletion would compare
    /// against the wrong partner and the count would drift. Rules replace
    /// within a single line, so the count is exact for them. Use
    /// [`RewriteResult::aligned_changed_lines`] for an alignment-aware count.
    pub changed_lines: usize,
    /// Replacements made by each rule, indexed like [`RuleSet::rules`].
    pub rule_hits: Vec<usize>,
    /// Matches each rule declined because an exclusion applied.
    pub rule_skips: Vec<usize>,
    modified: bool,
}

impl RewriteResult {
    /// Returns true if the text changed.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Total number of replacements across all rules.
    pub fn total_hits(&self) -> usize {
        self.rule_hits.iter().sum()
    }

    /// Total number of matches left alone by exclusions.
    pub fn total_skips(&self) -> usize {
        self.rule_skips.iter().sum()
    }

    /// Counts changed lines after aligning `original` with the rewritten text.
    pub fn aligned_changed_lines(&self, original: &str) -> usize {
        aligned_changed_lines(original, &self.text)
    }
}

/// Applies a rule set to text: every rule once, in table order.
///
/// There is no fixed-point iteration. A rule sees the output of every rule
/// before it, and never its own output. A second run over migrated text is a
/// no-op only if no template produces text that some matcher accepts; see
/// [`RuleSet::template_conflicts`].
#[derive(Debug, Clone)]
pub struct RewriteEngine {
    rules: RuleSet,
}

impl RewriteEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self { rules }
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rules
    }

    /// Rewrites `source`.
    pub fn rewrite(&self, source: &str) -> RewriteResult {
        let mut current = Cow::Borrowed(source);
        let mut rule_hits = Vec::with_capacity(self.rules.len());
        let mut rule_skips = Vec::with_capacity(self.rules.len());

        for (index, rule) in self.rules.rules().iter().enumerate() {
            let (next, hits, skips) = apply_rule(rule, &current);
            if hits > 0 {
                debug!(
                    rule_set = self.rules.name(),
                    rule = index,
                    hits,
                    "rule applied"
                );
            }
            if let Some(text) = next {
                current = Cow::Owned(text);
            }
            rule_hits.push(hits);
            rule_skips.push(skips);
        }

        let text = current.into_owned();
        RewriteResult {
            original_lines: source.lines().count(),
            changed_lines: positional_changed_lines(source, &text),
            modified: text != source,
            text,
            rule_hits,
            rule_skips,
        }
    }

    /// Returns true if running the rules again over `result` changes nothing.
    pub fn is_idempotent_on(&self, result: &RewriteResult) -> bool {
        !self.rewrite(&result.text).is_modified()
    }
}

/// Replaces every non-overlapping, non-excluded match of `rule` in `text`.
///
/// Excluded matches are copied through unchanged and scanning resumes after
/// them, exactly as if they had been replaced by themselves. The text is
/// `None` when nothing was replaced.
fn apply_rule(rule: &Rule, text: &str) -> (Option<String>, usize, usize) {
    let mut out = String::new();
    let mut last = 0;
    let mut hits = 0;
    let mut skips = 0;

    for caps in rule.matcher().captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        if rule.is_excluded(text, m.start(), m.end()) {
            trace!(
                matched = m.as_str(),
                offset = m.start(),
                "match excluded"
            );
            skips += 1;
            continue;
        }
        out.push_str(&text[last..m.start()]);
        caps.expand(rule.template(), &mut out);
        last = m.end();
        hits += 1;
    }

    if hits == 0 {
        return (None, 0, skips);
    }
    out.push_str(&text[last..]);
    (Some(out), hits, skips)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::builtin::{self, DEFAULT_FACTORY};

    fn disabled_rule() -> RuleSet {
        RuleSet::builder("disabled")
            .rule(r#""Disabled_" \+ (\w+)"#, "Keys.kDisabled($1)")
            .build()
            .unwrap()
    }

    fn guarded_has_upgrade() -> RuleSet {
        RuleSet::builder("has-upgrade")
            .rule_unless_followed_by(
                r#""HasUpgrade_" \+ (\w+)\)"#,
                "Keys.kHasUpgrade($1))",
                r"\s*\|\|",
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_end_to_end_single_line() {
        let engine = RewriteEngine::new(disabled_rule());
        let result = engine.rewrite("nbt.setBoolean(\"Disabled_\" + id, true);");

        assert_eq!(result.text, "nbt.setBoolean(Keys.kDisabled(id), true);");
        assert_eq!(result.changed_lines, 1);
        assert_eq!(result.original_lines, 1);
        assert_eq!(result.rule_hits, vec![1]);
        assert!(result.is_modified());
    }

    #[test]
    fn test_no_match_is_noop() {
        let engine = RewriteEngine::new(builtin::upgrade_state(DEFAULT_FACTORY).unwrap());
        let input = "int x = 1;\nString s = \"Disabled\" + id;\nnbt.getString(\"name\");\n";
        let result = engine.rewrite(input);

        assert_eq!(result.text, input);
        assert_eq!(result.changed_lines, 0);
        assert_eq!(result.total_hits(), 0);
        assert!(!result.is_modified());
    }

    #[test]
    fn test_empty_input() {
        let engine = RewriteEngine::new(disabled_rule());
        let result = engine.rewrite("");
        assert_eq!(result.text, "");
        assert_eq!(result.original_lines, 0);
        assert_eq!(result.changed_lines, 0);
    }

    #[test]
    fn test_exclusion_respected() {
        let engine = RewriteEngine::new(guarded_has_upgrade());

        let chained = "if (a.getBoolean(\"HasUpgrade_\" + x) || b) {";
        let result = engine.rewrite(chained);
        assert_eq!(result.text, chained);
        assert_eq!(result.rule_skips, vec![1]);

        let plain = "if (a.getBoolean(\"HasUpgrade_\" + x)) {";
        let result = engine.rewrite(plain);
        assert_eq!(result.text, "if (a.getBoolean(Keys.kHasUpgrade(x))) {");
    }

    #[test]
    fn test_excluded_match_does_not_block_later_matches() {
        let engine = RewriteEngine::new(guarded_has_upgrade());
        let input = "f(\"HasUpgrade_\" + a) || g(\"HasUpgrade_\" + b);";
        let result = engine.rewrite(input);
        assert_eq!(
            result.text,
            "f(\"HasUpgrade_\" + a) || g(Keys.kHasUpgrade(b));"
        );
        assert_eq!(result.rule_hits, vec![1]);
        assert_eq!(result.rule_skips, vec![1]);
    }

    #[test]
    fn test_positional_capture() {
        let engine = RewriteEngine::new(builtin::upgrade_state(DEFAULT_FACTORY).unwrap());
        for slot in ["slotIndex", "i", "UPG_A"] {
            let input = format!("    nbt.setInteger(\"OwnedMax_\" + {slot}, v); // keep");
            let expected = format!("    nbt.setInteger(Keys.kOwnedMax({slot}), v); // keep");
            assert_eq!(engine.rewrite(&input).text, expected);
        }
    }

    #[test]
    fn test_change_count_over_ten_lines() {
        let engine = RewriteEngine::new(builtin::upgrade_state(DEFAULT_FACTORY).unwrap());
        let input = "\
class Store {
    void save(NBTTagCompound nbt, String id) {
        nbt.setBoolean(\"Disabled_\" + id, true);
        int a = 1;
        nbt.setInteger(\"OwnedMax_\" + id, 3);
        int b = 2;
        // \"Disabled_\" is the legacy prefix
        nbt.setBoolean(\"HasUpgrade_\" + id, true);
    }
}";
        let result = engine.rewrite(input);
        assert_eq!(result.original_lines, 10);
        assert_eq!(result.changed_lines, 3);
        assert_eq!(result.aligned_changed_lines(input), 3);
    }

    #[test]
    fn test_idempotent_second_pass() {
        let engine = RewriteEngine::new(builtin::upgrade_state(DEFAULT_FACTORY).unwrap());
        let input = "\
nbt.setBoolean(\"Disabled_\" + id, true);
boolean x = nbt.getBoolean(\"HasUpgrade_\" + id) || other;
String k = \"upgrade_\" + id;
";
        let first = engine.rewrite(input);
        let second = engine.rewrite(&first.text);

        assert_eq!(second.text, first.text);
        assert_eq!(second.changed_lines, 0);
        assert!(engine.is_idempotent_on(&first));
    }

    #[test]
    fn test_non_overlapping_rule_order_is_irrelevant() {
        let a = (r#""A_" \+ (\w+)"#, "K.a($1)");
        let b = (r#""B_" \+ (\w+)"#, "K.b($1)");
        let ab = RuleSet::builder("ab").rule(a.0, a.1).rule(b.0, b.1).build().unwrap();
        let ba = RuleSet::builder("ba").rule(b.0, b.1).rule(a.0, a.1).build().unwrap();
        let input = "f(\"A_\" + x); g(\"B_\" + y);";

        assert_eq!(
            RewriteEngine::new(ab).rewrite(input).text,
            RewriteEngine::new(ba).rewrite(input).text
        );
    }

    #[test]
    fn test_overlapping_rules_earlier_wins() {
        let narrow = (r#""A_" \+ (\w+),"#, "K.write($1),");
        let broad = (r#""A_" \+ (\w+)"#, "K.any($1)");
        let input = "f(\"A_\" + x, 1);";

        let narrow_first = RuleSet::builder("narrow-first")
            .rule(narrow.0, narrow.1)
            .rule(broad.0, broad.1)
            .build()
            .unwrap();
        let broad_first = RuleSet::builder("broad-first")
            .rule(broad.0, broad.1)
            .rule(narrow.0, narrow.1)
            .build()
            .unwrap();

        let result = RewriteEngine::new(narrow_first).rewrite(input);
        assert_eq!(result.text, "f(K.write(x), 1);");
        assert_eq!(result.rule_hits, vec![1, 0]);

        let result = RewriteEngine::new(broad_first).rewrite(input);
        assert_eq!(result.text, "f(K.any(x), 1);");
        assert_eq!(result.rule_hits, vec![1, 0]);
    }

    #[test]
    fn test_self_feeding_rule_breaks_idempotence() {
        let set = RuleSet::builder("loop")
            .rule(r#""A_" \+ (\w+)"#, r#""A_" + $1 + "x""#)
            .build()
            .unwrap();
        let engine = RewriteEngine::new(set);
        let first = engine.rewrite("f(\"A_\" + id);");
        assert!(!engine.is_idempotent_on(&first));
    }

    #[test]
    fn test_named_capture_template() {
        let set = RuleSet::builder("named")
            .rule(r#""LastLevel_" \+ (?P<id>\w+)"#, "Keys.kLastLevel(${id})")
            .build()
            .unwrap();
        let result = RewriteEngine::new(set).rewrite("int l = nbt.getInteger(\"LastLevel_\" + baseId);");
        assert_eq!(result.text, "int l = nbt.getInteger(Keys.kLastLevel(baseId));");
    }
}
