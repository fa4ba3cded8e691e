//! # keymigrate
//!
//! Rewrites persistence keys built by string concatenation into calls to a
//! key-factory, one ordered table of regex rules at a time.
//!
//! ```text
//! nbt.setBoolean("Disabled_" + id, true);   ->   nbt.setBoolean(Keys.kDisabled(id), true);
//! ```
//!
//! The rewrite is lexical. Nothing is parsed, and a rewritten call is only as
//! correct as the rule that produced it. Rules can carry exclusions that keep
//! them away from call sites they cannot rewrite safely, such as reads joined
//! by `||`; those sites are left for a human.
//!
//! ## Quick Start
//!
//! ```rust
//! use keymigrate::prelude::*;
//!
//! let rules = RuleSet::builder("disabled")
//!     .rule(r#""Disabled_" \+ (\w+)"#, "Keys.kDisabled($1)")
//!     .build()?;
//!
//! let result = RewriteEngine::new(rules).rewrite(r#"nbt.setBoolean("Disabled_" + id, true);"#);
//! assert_eq!(result.text, "nbt.setBoolean(Keys.kDisabled(id), true);");
//! assert_eq!(result.changed_lines, 1);
//! # Ok::<(), keymigrate::error::MigrateError>(())
//! ```
//!
//! ## Migrating Files
//!
//! ```rust,no_run
//! use keymigrate::prelude::*;
//! use keymigrate::rules::builtin;
//!
//! let report = MigrationTask::new(builtin::upgrade_state("UpgradeKeys")?)
//!     .target("src/main/java")
//!     .extension("java")
//!     .dry_run()
//!     .run()?;
//!
//! println!("{}", report.diff());
//! # Ok::<(), keymigrate::error::MigrateError>(())
//! ```

pub mod diff;
pub mod engine;
pub mod error;
pub mod migrate;
pub mod rules;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::diff::DiffSummary;
    pub use crate::engine::{RewriteEngine, RewriteResult};
    pub use crate::error::{MigrateError, Result};
    pub use crate::migrate::{FileReport, MigrationReport, MigrationTask};
    pub use crate::rules::{
        Exclusion, ExclusionSpec, Rule, RuleSet, RuleSetBuilder, RuleSetConfig, RuleSpec,
    };
}

pub use prelude::*;
