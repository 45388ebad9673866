//! Output functions for consistent CLI formatting
//!
//! Status lines go to stderr so stdout carries only command results.

use super::context::UiContext;
use console::style;

/// Display a success step
pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.show_progress() {
        eprintln!("{} {}", style("✓").green(), message);
    } else {
        eprintln!("  {} {}", style("[OK]").green(), message);
    }
}

/// Display a success step with detail
pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.show_progress() {
        eprintln!(
            "{} {} ({})",
            style("✓").green(),
            message,
            style(detail).dim()
        );
    } else {
        eprintln!("  {} {} ({})", style("[OK]").green(), message, detail);
    }
}

/// Display a warning step with hint
pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.show_progress() {
        eprintln!(
            "{} {} - {}",
            style("!").yellow(),
            message,
            style(hint).dim()
        );
    } else {
        eprintln!("  {} {} - {}", style("[WARN]").yellow(), message, hint);
    }
}

/// Display an info step
pub fn step_info(ctx: &UiContext, message: &str) {
    if ctx.show_progress() {
        eprintln!("{} {}", style("•").cyan(), message);
    } else {
        eprintln!("  {} {}", style("[INFO]").cyan(), message);
    }
}

/// Display a label/value pair
pub fn key_value(label: &str, value: &str) {
    println!("{:<10} {}", style(format!("{}:", label)).bold(), value);
}
