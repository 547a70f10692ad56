/*!
 * Error Types
 * Errors for the blocking-wait helpers, with thiserror and miette
 *
 * Sequence number operations themselves never fail.
 */

use miette::Diagnostic;
use thiserror::Error;

/// Result type for poll operations
pub type PollResult<T> = Result<T, PollError>;

/// Blocking-wait errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum PollError {
    #[error("Blocking wait timed out")]
    #[diagnostic(
        code(poll::timeout),
        help("No watched sequence number changed before the deadline.")
    )]
    Timeout,

    #[error("Thread still has {0} registered seq waits")]
    #[diagnostic(
        code(poll::registrations_pending),
        help("Call woke() before replacing the thread's wake channel.")
    )]
    RegistrationsPending(usize),
}

impl PollError {
    /// Whether this is a timeout rather than misuse
    pub fn is_timeout(&self) -> bool {
        matches!(self, PollError::Timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diagnostic_codes_and_help() {
        let code = |e: &PollError| e.code().map(|c| c.to_string());
        assert_eq!(code(&PollError::Timeout).as_deref(), Some("poll::timeout"));
        assert_eq!(
            code(&PollError::RegistrationsPending(3)).as_deref(),
            Some("poll::registrations_pending")
        );

        let help = PollError::RegistrationsPending(3).help().map(|h| h.to_string());
        assert!(help.is_some_and(|h| h.contains("woke()")));
    }

    #[test]
    fn test_report_keeps_error_message() {
        let report: miette::Report = PollError::Timeout.into();
        assert_eq!(report.to_string(), "Blocking wait timed out");
        assert!(report.downcast_ref::<PollError>().is_some_and(PollError::is_timeout));
    }
}
