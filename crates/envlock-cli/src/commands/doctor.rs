use super::{EXIT_FAILURE, EXIT_SUCCESS};
use envlock_core::LockConfig;
use envlock_runtime::{check_backend_prereqs, format_missing, select_backend};

pub fn run(config: &LockConfig) -> Result<u8, String> {
    let checks = collect_checks(config);
    let all_pass = checks.iter().all(|c| c.status != Status::Fail);

    println!("envlock doctor\n");
    for check in &checks {
        println!("  {} {}", check.status.icon(), check.message);
    }
    println!();
    if all_pass {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. See above for details.");
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

fn collect_checks(config: &LockConfig) -> Vec<Check> {
    let mut checks = Vec::new();

    match select_backend(&config.backend, config.executable.as_deref()) {
        Ok(_) => checks.push(Check::pass(format!(
            "Backend '{}' is supported",
            config.backend
        ))),
        Err(e) => checks.push(Check::fail(e.to_string())),
    }

    let missing = check_backend_prereqs(&config.backend, config.executable());
    if missing.is_empty() {
        checks.push(Check::pass(format!(
            "Package manager '{}' found",
            config.executable()
        )));
    } else {
        checks.push(Check::fail(format_missing(&missing)));
    }

    checks.push(Check::info(format!(
        "Probing {} then {} on channels {} (when the manifest lists none)",
        config.probe.noarch,
        config.probe.platforms.join(", "),
        config.default_channels.join(", ")
    )));
    checks.push(Check::info(format!("Merge policy: {}", config.policy)));
    checks
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Pass,
    Fail,
    Info,
}

impl Status {
    fn icon(self) -> &'static str {
        match self {
            Self::Pass => "✓",
            Self::Fail => "✗",
            Self::Info => "ℹ",
        }
    }
}

struct Check {
    status: Status,
    message: String,
}

impl Check {
    fn pass(message: String) -> Self {
        Self {
            status: Status::Pass,
            message,
        }
    }

    fn fail(message: String) -> Self {
        Self {
            status: Status::Fail,
            message,
        }
    }

    fn info(message: String) -> Self {
        Self {
            status: Status::Info,
            message,
        }
    }
}
