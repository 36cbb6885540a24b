pub mod completions;
pub mod doctor;
pub mod env;
pub mod requirements;

use indicatif::{ProgressBar, ProgressStyle};
use std::io::Read;
use std::path::Path;
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_RESOLUTION_ERROR: u8 = 3;

const STDIN_SENTINEL: &str = "-";

/// Spinner on stderr. Draws nothing when stderr is not a terminal.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    if let Ok(style) = ProgressStyle::with_template("{msg}") {
        pb.set_style(style);
    }
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Contents of `path`, or of stdin for `-`.
pub fn read_input(path: &Path) -> Result<String, String> {
    if path.as_os_str() == STDIN_SENTINEL {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .map_err(|e| format!("failed to read manifest from stdin: {e}"))?;
        return Ok(content);
    }
    std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read manifest {}: {e}", path.display()))
}

/// Directory local dependency paths are taken from: the input file's
/// directory, or the working directory for stdin.
pub fn base_dir(path: &Path) -> &Path {
    if path.as_os_str() == STDIN_SENTINEL {
        return Path::new(".");
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
