//! Resume rules for `continue`.
//!
//! | status            | requirement                      |
//! |-------------------|----------------------------------|
//! | RUNNING           | janitor decides (see janitor.rs) |
//! | WAITING_FOR_INPUT | response.txt or a new message    |
//! | INTERRUPTED       | message optional                 |
//! | COMPLETED         | message required (extension)     |
//! | FAILED            | message required (retry)         |

use delta_domain::run::RunStatus;
use delta_domain::{Error, Result};

/// Validate a continuation request against the run's current status.
/// `has_response` reflects whether `interaction/response.txt` exists.
pub fn check_resume(
    status: RunStatus,
    has_message: bool,
    has_response: bool,
) -> Result<()> {
    match status {
        RunStatus::Running => Ok(()), // janitor handles liveness
        RunStatus::WaitingForInput => {
            if has_message || has_response {
                Ok(())
            } else {
                Err(Error::RunState(
                    "run is waiting for input: write interaction/response.txt \
                     or pass --message"
                        .into(),
                ))
            }
        }
        RunStatus::Interrupted => Ok(()),
        RunStatus::Completed | RunStatus::Failed => {
            if has_message {
                Ok(())
            } else {
                Err(Error::RunState(format!(
                    "run already ended with status {status}; \
                     --message is required to continue it"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiting_needs_response_or_message() {
        assert!(check_resume(RunStatus::WaitingForInput, false, false).is_err());
        assert!(check_resume(RunStatus::WaitingForInput, true, false).is_ok());
        assert!(check_resume(RunStatus::WaitingForInput, false, true).is_ok());
    }

    #[test]
    fn interrupted_message_optional() {
        assert!(check_resume(RunStatus::Interrupted, false, false).is_ok());
        assert!(check_resume(RunStatus::Interrupted, true, false).is_ok());
    }

    #[test]
    fn terminal_states_require_message() {
        assert!(check_resume(RunStatus::Completed, false, false).is_err());
        assert!(check_resume(RunStatus::Completed, true, false).is_ok());
        assert!(check_resume(RunStatus::Failed, false, false).is_err());
        assert!(check_resume(RunStatus::Failed, true, false).is_ok());
    }
}
