//! Spinners for long, quiet stages (terraform apply, create-env).
//!
//! Spinners are drawn to stderr and hidden when it is not a terminal, so
//! stdout stays clean for accessor verbs.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Start a spinner with `msg`.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&[
            "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓",
        ]));
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Stop the spinner and leave a success line.
pub fn finish_success(pb: &ProgressBar, msg: &str) {
    pb.finish_with_message(msg.to_string());
}

/// Stop the spinner and remove it.
pub fn finish_clear(pb: &ProgressBar) {
    pb.finish_and_clear();
}

/// Run `f` under a spinner when `show` is set. The spinner is cleared on
/// failure so the error is the last thing printed.
pub fn stage<T, E>(show: bool, msg: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
    if !show {
        log::info!("{msg}");
        return f();
    }

    let pb = spinner(msg);
    let result = f();
    match &result {
        Ok(_) => finish_success(&pb, msg),
        Err(_) => finish_clear(&pb),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_passes_result_through() {
        let ok: Result<u8, String> = stage(false, "quiet", || Ok(7));
        assert_eq!(ok, Ok(7));

        let err: Result<u8, String> = stage(true, "failing", || Err("boom".to_string()));
        assert_eq!(err, Err("boom".to_string()));
    }
}
