//! Fixed-length messages

use crate::error::{Error, Result};

/// A fixed-length byte payload
///
/// The length is a const generic, so transmit and receive buffers of one
/// engine can never disagree on size.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Message<const N: usize> {
    payload: [u8; N],
}

impl<const N: usize> Message<N> {
    /// Wrap a payload
    pub const fn new(payload: [u8; N]) -> Self {
        Self { payload }
    }

    /// All-zero payload
    pub const fn zeroed() -> Self {
        Self { payload: [0; N] }
    }

    /// Copy `bytes` into a zero-padded payload of length `N`
    ///
    /// Fails if `bytes` is longer than `N`.
    pub const fn padded(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > N {
            return None;
        }
        let mut payload = [0u8; N];
        let mut i = 0;
        while i < bytes.len() {
            payload[i] = bytes[i];
            i += 1;
        }
        Some(Self { payload })
    }

    /// Payload bytes
    pub const fn as_bytes(&self) -> &[u8; N] {
        &self.payload
    }

    /// Payload length
    pub const fn len(&self) -> usize {
        N
    }

    /// True for a zero-length message
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Reject zero-length messages
    pub const fn check(&self) -> Result<()> {
        if N == 0 {
            Err(Error::EmptyMessage)
        } else {
            Ok(())
        }
    }
}

impl<const N: usize> From<[u8; N]> for Message<N> {
    fn from(payload: [u8; N]) -> Self {
        Self::new(payload)
    }
}

impl<const N: usize> AsRef<[u8]> for Message<N> {
    fn as_ref(&self) -> &[u8] {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded() {
        let msg = Message::<16>::padded(b"Hi from STM32").unwrap();
        assert_eq!(&msg.as_bytes()[..13], b"Hi from STM32");
        assert_eq!(&msg.as_bytes()[13..], &[0, 0, 0]);

        assert!(Message::<4>::padded(b"too long").is_none());
    }

    #[test]
    fn test_empty_rejected() {
        assert_eq!(Message::<0>::new([]).check(), Err(Error::EmptyMessage));
        assert_eq!(Message::new(*b"ok").check(), Ok(()));
    }
}
