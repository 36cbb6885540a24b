use crate::CoreError;
use std::sync::atomic::{AtomicBool, Ordering};

static INTERRUPT_REQUESTED: AtomicBool = AtomicBool::new(false);

/// First Ctrl-C sets a flag the locker checks between stages, so the
/// ephemeral environment is still torn down. A second Ctrl-C exits at once.
pub fn install_signal_handler() {
    let _ = ctrlc::set_handler(move || {
        if INTERRUPT_REQUESTED.load(Ordering::SeqCst) {
            std::process::exit(1);
        }
        INTERRUPT_REQUESTED.store(true, Ordering::SeqCst);
        eprintln!("\ninterrupt requested, cleaning up...");
    });
}

pub fn interrupt_requested() -> bool {
    INTERRUPT_REQUESTED.load(Ordering::SeqCst)
}

pub(crate) fn check_interrupt() -> Result<(), CoreError> {
    if interrupt_requested() {
        return Err(CoreError::Interrupted);
    }
    Ok(())
}
