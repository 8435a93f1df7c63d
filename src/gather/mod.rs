//! Gathering module.
//!
//! Provides:
//! - The gather session that pages a source until a target or cutoff
//! - Validation rules deciding which posts are kept

pub mod rules;
pub mod session;

pub use rules::{
    aspect_within, rules_from_filters, AspectRange, MaxAge, MinDimensions, MinScore,
    ValidationRule, Verdict,
};
pub use session::GatherSession;
