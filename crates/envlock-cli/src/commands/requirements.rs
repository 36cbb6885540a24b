use super::{read_input, spin_fail, spin_ok, spinner, EXIT_SUCCESS};
use envlock_core::{LockConfig, Locker};
use std::path::Path;

pub fn run(
    config: LockConfig,
    requirements_path: &Path,
    python: Option<&str>,
    pip: Option<&str>,
) -> Result<u8, String> {
    let input = read_input(requirements_path)?;
    let locker = Locker::new(config).map_err(|e| e.to_string())?;

    let pb = spinner("resolving requirements...");
    match locker.lock_requirements(&input, python, pip) {
        Ok(pinned) => {
            spin_ok(&pb, &format!("{} requirements pinned", pinned.len()));
            if !pinned.is_empty() {
                println!("{}", pinned.join("\n"));
            }
            Ok(EXIT_SUCCESS)
        }
        Err(e) => {
            spin_fail(&pb, "lock failed");
            Err(e.to_string())
        }
    }
}
