use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    eprintln!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    eprintln!("{} {}", "✓".green(), msg);
}

/// Print an error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a dim/muted message
pub fn dim(msg: &str) {
    eprintln!("  {}", msg.dimmed());
}

/// Print the user-managed files found in the state directory.
pub fn patches(files: &[std::path::PathBuf]) {
    if files.is_empty() {
        return;
    }
    info("you've supplied the following files to bbl:");
    for file in files {
        dim(&file.display().to_string());
    }
}

/// Quote a value for `export NAME=...` in a POSIX shell.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

// ============================================================================
// Tests
// ============================================================================
