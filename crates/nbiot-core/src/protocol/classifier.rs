//! Response classification
//!
//! Decides, from the bytes read since the last write, whether the modem has
//! finished answering. Bytes arrive one at a time and a terminator may be
//! split across polls, so only suffixes of the whole buffer are inspected.

/// Terminator of a successful response
pub const OK_TERMINATOR: &[u8] = b"OK\r\n";

/// Terminator of a rejected command
pub const ERROR_TERMINATOR: &[u8] = b"ERROR\r\n";

/// Sentinel marking an attempt that ran out of time
pub const TIMEOUT_SENTINEL: &[u8] = b"TIMEOUT\r\n";

/// Classification of an attempt's response buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// No terminator yet; keep reading until the deadline
    Pending,
    /// `OK` terminator seen; carries the whole response text
    Success(String),
    /// `ERROR` terminator seen
    Error,
    /// Deadline elapsed without a terminator, or the channel closed
    Timeout,
}

impl ResponseOutcome {
    /// True for every outcome except [`ResponseOutcome::Pending`]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ResponseOutcome::Pending)
    }

    /// True for [`ResponseOutcome::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseOutcome::Success(_))
    }
}

/// Classify the bytes accumulated so far
pub fn classify(buffer: &[u8]) -> ResponseOutcome {
    if buffer.ends_with(OK_TERMINATOR) {
        ResponseOutcome::Success(String::from_utf8_lossy(buffer).into_owned())
    } else if buffer.ends_with(ERROR_TERMINATOR) {
        ResponseOutcome::Error
    } else if buffer.ends_with(TIMEOUT_SENTINEL) {
        ResponseOutcome::Timeout
    } else {
        ResponseOutcome::Pending
    }
}

/// Classify a buffer whose read phase is over (deadline or end of stream).
///
/// A buffer that already ends in a terminator keeps its classification;
/// anything else, including an empty buffer, is a timeout.
pub fn finish(buffer: &[u8]) -> ResponseOutcome {
    match classify(buffer) {
        ResponseOutcome::Pending => ResponseOutcome::Timeout,
        outcome => outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_suffix_is_success() {
        let outcome = classify(b"\r\n+CSQ: 15,99\r\n\r\nOK\r\n");
        assert_eq!(
            outcome,
            ResponseOutcome::Success("\r\n+CSQ: 15,99\r\n\r\nOK\r\n".to_string())
        );
    }

    #[test]
    fn test_error_suffix() {
        assert_eq!(classify(b"\r\nERROR\r\n"), ResponseOutcome::Error);
    }

    #[test]
    fn test_timeout_sentinel() {
        assert_eq!(classify(b"TIMEOUT\r\n"), ResponseOutcome::Timeout);
    }

    #[test]
    fn test_partial_terminator_is_pending() {
        assert_eq!(classify(b""), ResponseOutcome::Pending);
        assert_eq!(classify(b"+CSQ: 15,99\r\nO"), ResponseOutcome::Pending);
        assert_eq!(classify(b"+CSQ: 15,99\r\nOK"), ResponseOutcome::Pending);
        assert_eq!(classify(b"+CSQ: 15,99\r\nOK\r"), ResponseOutcome::Pending);
        assert_eq!(classify(b"ERR"), ResponseOutcome::Pending);
    }

    #[test]
    fn test_ok_must_be_a_suffix() {
        // An OK followed by more data (e.g. an unsolicited line) is not done
        assert_eq!(classify(b"OK\r\n+CPIN"), ResponseOutcome::Pending);
    }

    #[test]
    fn test_byte_by_byte_accumulation() {
        let response = b"\r\n+CGATT: 1\r\n\r\nOK\r\n";
        let mut buffer = Vec::new();
        for (i, byte) in response.iter().enumerate() {
            buffer.push(*byte);
            let outcome = classify(&buffer);
            if i + 1 < response.len() {
                assert_eq!(outcome, ResponseOutcome::Pending, "at byte {}", i);
            } else {
                assert!(outcome.is_success());
            }
        }
    }

    #[test]
    fn test_classification_is_idempotent() {
        for buffer in [
            &b"+CSQ: 15,99\r\nOK\r\n"[..],
            b"ERROR\r\n",
            b"TIMEOUT\r\n",
            b"partial",
        ] {
            assert_eq!(classify(buffer), classify(buffer));
            assert_eq!(finish(buffer), finish(buffer));
        }
    }

    #[test]
    fn test_finish_forces_timeout() {
        assert_eq!(finish(b""), ResponseOutcome::Timeout);
        assert_eq!(finish(b"+CSQ: 15,99\r\n"), ResponseOutcome::Timeout);
        assert_eq!(finish(b"ERROR\r\n"), ResponseOutcome::Error);
        assert!(finish(b"OK\r\n").is_success());
    }

    #[test]
    fn test_invalid_utf8_is_decoded_lossily() {
        match classify(b"\xff\xfe\r\nOK\r\n") {
            ResponseOutcome::Success(text) => assert!(text.ends_with("OK\r\n")),
            other => panic!("Expected success, got {:?}", other),
        }
    }
}
