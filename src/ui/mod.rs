//! Terminal output for the morph CLI
//!
//! Spinners and status lines are drawn with `indicatif` and `console` in an
//! interactive terminal, and fall back to plain tagged lines in CI.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, step_info, step_ok, step_ok_detail, step_warn_hint};
pub use progress::TaskSpinner;
