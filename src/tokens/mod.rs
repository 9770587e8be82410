//! Display template module orchestrator.
//!
//! Templates are plain text with `{token}` placeholders resolved by literal
//! substitution. There is no escaping: a substituted value that itself
//! contains `{name}` can be picked up by a later replacement in the same
//! pass. Token names produced by this crate are disjoint, so the order of
//! replacement does not matter for them.

mod core;

pub use self::core::{DisplayTemplate, TemplateValues, load_replacements, load_template};
