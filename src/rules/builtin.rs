//! Built-in rule tables for the upgrade key families.
//!
//! Every key family (a literal prefix such as `"Disabled_"` plus the factory
//! method that builds it) contributes three rules, narrowest first:
//!
//! 1. read form, `"P_" + id)`, skipped when the call is part of an `||` chain
//! 2. write form, `"P_" + id,`
//! 3. bare form, `"P_" + id`, skipped inside argument lists and larger
//!    expressions (`,` `)` `.` `(` `[` `+` `*` `/` `%` `--` `||` after the
//!    identifier)
//!
//! The bare form's guard also keeps it off the OR-chain sites the read form
//! declined, so those stay byte-for-byte unchanged.

use crate::error::{MigrateError, Result};
use regex::Regex;

use super::{RuleSet, RuleSetBuilder};

/// Receiver the generated calls are made on, e.g. `Keys.kDisabled(id)`.
pub const DEFAULT_FACTORY: &str = "Keys";

/// Names accepted by [`by_name`].
pub const BUILTIN_NAMES: &[&str] = &["upgrade-state", "pause-state", "penalty"];

const OR_CHAIN: &str = r"\s*\|\|";
const ARGUMENT_OR_COMPOUND: &str = r"\s*(?:[,)(.\[+*/%]|\|\||--)";

const CASE_VARIANT_NOTE: &str = "Keys built from id.toUpperCase()/id.toLowerCase() variants are left unchanged; \
     collapse each variant group into a single factory call by hand.";

const UPGRADE_STATE: &[(&str, &str)] = &[
    ("HasUpgrade_", "kHasUpgrade"),
    ("Disabled_", "kDisabled"),
    ("OwnedMax_", "kOwnedMax"),
    ("OriginalMax_", "kOriginalMax"),
    ("upgrade_", "kUpgrade"),
];

const PAUSE_STATE: &[(&str, &str)] = &[
    ("IsPaused_", "kPaused"),
    ("LastLevel_", "kLastLevel"),
    ("UpgradeLock_", "kLock"),
    ("Destroyed_", "kDestroyed"),
    ("DestroyTime_", "kDestroyTime"),
];

const PENALTY: &[(&str, &str)] = &[
    ("WasPunished_", "kWasPunished"),
    ("DamageCount_", "kDamageCount"),
    ("TotalDamageCount_", "kTotalDamageCount"),
    ("PenaltyCap_", "kPenaltyCap"),
    ("PenaltyExpire_", "kPenaltyExpire"),
    ("PenaltyTier_", "kPenaltyTier"),
    ("PenaltyDebtFE_", "kPenaltyDebtFE"),
    ("PenaltyDebtXP_", "kPenaltyDebtXP"),
];

/// Looks up a built-in rule set by name.
pub fn by_name(name: &str, factory: &str) -> Result<RuleSet> {
    match name {
        "upgrade-state" => upgrade_state(factory),
        "pause-state" => pause_state(factory),
        "penalty" => penalty(factory),
        other => Err(MigrateError::UnknownRuleSet(other.to_string())),
    }
}

/// Returns every built-in rule set.
pub fn all(factory: &str) -> Result<Vec<RuleSet>> {
    BUILTIN_NAMES
        .iter()
        .map(|name| by_name(name, factory))
        .collect()
}

/// Ownership, disable and level-storage keys.
pub fn upgrade_state(factory: &str) -> Result<RuleSet> {
    families(
        RuleSet::builder("upgrade-state")
            .description("Upgrade ownership, disable and level keys")
            .manual_note(
                "Reads joined by || (e.g. getBoolean(\"HasUpgrade_\" + id) || ...) are left \
                 unchanged; merge the alternatives by hand.",
            )
            .manual_note(CASE_VARIANT_NOTE),
        factory,
        UPGRADE_STATE,
    )?
    .build()
}

/// Pause, lock and destruction keys.
pub fn pause_state(factory: &str) -> Result<RuleSet> {
    families(
        RuleSet::builder("pause-state")
            .description("Pause, lock and destruction keys")
            .manual_note(
                "Three-way pause checks (IsPaused_ + id || IsPaused_ + U(id) || ...) are left \
                 unchanged; replace them with a single kPaused lookup by hand.",
            )
            .manual_note(CASE_VARIANT_NOTE),
        factory,
        PAUSE_STATE,
    )?
    .build()
}

/// Punishment and repair bookkeeping keys.
pub fn penalty(factory: &str) -> Result<RuleSet> {
    families(
        RuleSet::builder("penalty")
            .description("Punishment and repair bookkeeping keys")
            .manual_note(
                "Keys built from prefix constants (e.g. K_WAS_PUNISHED + id) are not string \
                 literals and are not rewritten.",
            ),
        factory,
        PENALTY,
    )?
    .build()
}

fn families(
    mut builder: RuleSetBuilder,
    factory: &str,
    table: &[(&str, &str)],
) -> Result<RuleSetBuilder> {
    validate_factory(factory)?;
    for (prefix, method) in table {
        builder = key_family(builder, factory, prefix, method);
    }
    Ok(builder)
}

fn key_family(builder: RuleSetBuilder, factory: &str, prefix: &str, method: &str) -> RuleSetBuilder {
    let key = format!(r#""{}"\s*\+\s*(\w+)"#, regex::escape(prefix));
    let call = format!("{factory}.{method}");
    builder
        .rule_unless_followed_by(format!(r"{key}\)"), format!("{call}(${{1}}))"), OR_CHAIN)
        .rule(format!("{key},"), format!("{call}(${{1}}),"))
        .rule_unless_followed_by(key, format!("{call}(${{1}})"), ARGUMENT_OR_COMPOUND)
}

fn validate_factory(factory: &str) -> Result<()> {
    let valid = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*$")?;
    if valid.is_match(factory) {
        Ok(())
    } else {
        Err(MigrateError::InvalidConfig(format!(
            "factory receiver '{factory}' is not a qualified identifier"
        )))
    }
}
