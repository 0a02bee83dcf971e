//! Response validation policies
//!
//! Exactly one policy is active per engine. Validation only runs after a
//! successful transfer; a bus error never reaches this module.

use crate::message::Message;
use core::fmt;

/// How the received bytes are judged
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationPolicy<const N: usize> {
    /// MOSI is wired to MISO: the reply must equal the transmitted message
    Loopback,
    /// A peer device must reply with this exact message
    PeerResponse(Message<N>),
    /// Report the received bytes without judging them
    ReportOnly,
}

impl<const N: usize> ValidationPolicy<N> {
    /// Judge `received` against this policy
    pub fn check(&self, tx: &Message<N>, received: &[u8; N]) -> ValidationOutcome {
        match self {
            Self::Loopback => {
                if received == tx.as_bytes() {
                    ValidationOutcome::Passed
                } else {
                    ValidationOutcome::Mismatch
                }
            }
            Self::PeerResponse(expected) => {
                if received == expected.as_bytes() {
                    ValidationOutcome::Passed
                } else {
                    ValidationOutcome::Unexpected
                }
            }
            Self::ReportOnly => ValidationOutcome::Unchecked,
        }
    }

    /// Expected reply, if the policy has one
    pub fn expected<'a>(&'a self, tx: &'a Message<N>) -> Option<&'a [u8; N]> {
        match self {
            Self::Loopback => Some(tx.as_bytes()),
            Self::PeerResponse(expected) => Some(expected.as_bytes()),
            Self::ReportOnly => None,
        }
    }

    /// Short policy name for logs
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Loopback => "loopback",
            Self::PeerResponse(_) => "peer-response",
            Self::ReportOnly => "report-only",
        }
    }
}

/// Result of applying a policy to a received buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValidationOutcome {
    /// Reply matches the expectation
    Passed,
    /// Loopback reply differs from what was sent
    Mismatch,
    /// Peer replied with something other than the expected response
    Unexpected,
    /// No expectation configured
    Unchecked,
}

impl ValidationOutcome {
    /// True for `Mismatch` and `Unexpected`
    pub const fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch | Self::Unexpected)
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "PASSED"),
            Self::Mismatch => write!(f, "FAILED - data mismatch"),
            Self::Unexpected => write!(f, "UNEXPECTED response"),
            Self::Unchecked => write!(f, "not checked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: Message<14> = Message::new(*b"Hello from nRF");

    #[test]
    fn test_loopback() {
        let policy = ValidationPolicy::Loopback;
        assert_eq!(policy.check(&HELLO, b"Hello from nRF"), ValidationOutcome::Passed);
        assert_eq!(policy.check(&HELLO, b"Hello from nRG"), ValidationOutcome::Mismatch);
        assert_eq!(policy.expected(&HELLO), Some(HELLO.as_bytes()));
    }

    #[test]
    fn test_peer_response() {
        let reply = Message::<14>::padded(b"Hi from STM32").unwrap();
        let policy = ValidationPolicy::PeerResponse(reply);

        assert_eq!(policy.check(&HELLO, reply.as_bytes()), ValidationOutcome::Passed);
        assert_eq!(policy.check(&HELLO, &[0; 14]), ValidationOutcome::Unexpected);
        // An echo is not the expected peer reply
        assert_eq!(policy.check(&HELLO, HELLO.as_bytes()), ValidationOutcome::Unexpected);
    }

    #[test]
    fn test_report_only() {
        let policy = ValidationPolicy::<14>::ReportOnly;
        assert_eq!(policy.check(&HELLO, &[0xFF; 14]), ValidationOutcome::Unchecked);
        assert!(policy.expected(&HELLO).is_none());
        assert!(!ValidationOutcome::Unchecked.is_mismatch());
        assert!(ValidationOutcome::Unexpected.is_mismatch());
    }
}
