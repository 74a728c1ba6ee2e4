//! Ctrl+C handling
//!
//! One process-wide flag, set by the handler and polled by the command
//! runner. When no command is running the handler exits straight away so
//! that blocking prompts do not swallow the interrupt.

use crate::error::{exit_codes, Error, Result};
use once_cell::sync::OnceCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Message shown when the user interrupts a run
pub const MESSAGE: &str = "Operation interrupted by user";

static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static RUNNING: AtomicUsize = AtomicUsize::new(0);
static INSTALLED: OnceCell<()> = OnceCell::new();

/// Install the Ctrl+C handler (idempotent)
pub fn install() -> Result<()> {
    INSTALLED
        .get_or_try_init(|| {
            ctrlc::set_handler(|| {
                INTERRUPTED.store(true, Ordering::SeqCst);
                if RUNNING.load(Ordering::SeqCst) == 0 {
                    eprintln!("\n{}", MESSAGE);
                    std::process::exit(exit_codes::FAILURE);
                }
            })
        })
        .map(|_| ())
        .map_err(|e| Error::internal(format!("Failed to install Ctrl+C handler: {}", e)))
}

/// Whether Ctrl+C has been pressed
pub fn is_interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

/// Return an `Interrupted` error if Ctrl+C has been pressed
pub fn check() -> Result<()> {
    if is_interrupted() {
        Err(Error::interrupted())
    } else {
        Ok(())
    }
}

/// Marks a child process as running until dropped
#[derive(Debug)]
pub struct RunningGuard(());

impl Drop for RunningGuard {
    fn drop(&mut self) {
        RUNNING.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Tell the handler that a child is running and will observe the flag
pub fn enter_command() -> RunningGuard {
    RUNNING.fetch_add(1, Ordering::SeqCst);
    RunningGuard(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_balances_counter() {
        let guard = enter_command();
        assert!(RUNNING.load(Ordering::SeqCst) >= 1);
        drop(guard);
    }

    #[test]
    fn test_check_without_interrupt() {
        assert!(check().is_ok());
    }
}
