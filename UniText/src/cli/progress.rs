//! CLI progress display utilities
//!
//! Step lines with emoji markers, plus a percentage bar that plugs into the
//! library's `(percent, status)` progress callbacks.

use std::time::Duration;

use console::{Emoji, style};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};

/// Magnifying glass - for scanning operations
pub static LOOKING_GLASS: Emoji<'_, '_> = Emoji("🔍 ", "");
/// Floppy disk - for writing/saving operations
pub static DISK: Emoji<'_, '_> = Emoji("💾 ", "");
/// Gear - for injection
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");
/// Sparkles - for completion
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");
/// Document - for inventory operations
pub static DOCUMENT: Emoji<'_, '_> = Emoji("📄 ", "");
/// Rewind - for restoring backups
pub static REWIND: Emoji<'_, '_> = Emoji("⏪ ", "");

/// Print a step indicator: `[1/3] 🔍 Message...`
pub fn print_step(current: usize, total: usize, emoji: Emoji, msg: &str) {
    println!(
        "{} {}{}",
        style(format!("[{current}/{total}]")).bold().dim(),
        emoji,
        msg
    );
}

/// Print completion message: `✨ Done in 2s`
pub fn print_done(elapsed: Duration) {
    println!("{} Done in {}", SPARKLE, HumanDuration(elapsed));
}

/// Progress bar style for percentage-driven progress
///
/// Format: `[████████░░░░░░░░] 50% level0.assets`
///
/// # Panics
/// Panics if the template string is invalid (this is a compile-time constant).
#[must_use]
pub fn percent_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("[{bar:40.cyan/blue}] {pos:>3}% {wide_msg}")
        .expect("valid template")
        .progress_chars("█▓░")
}

/// A 0 to 100 bar, hidden when `quiet`
#[must_use]
pub fn percent_bar(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(100);
    pb.set_style(percent_style());
    pb
}

/// Adapt a bar to the library's progress callback shape
pub fn bar_callback(pb: &ProgressBar) -> impl Fn(f32, &str) + Sync + Send + '_ {
    move |percent, status| {
        pb.set_position(percent.clamp(0.0, 100.0) as u64);
        pb.set_message(status.to_string());
    }
}
