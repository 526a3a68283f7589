//! # AT Protocol
//!
//! Command builders and response classification for SIM800 modules.
//! Commands are ASCII terminated by `\r`; responses arrive as `\r\n`
//! delimited lines.

/// Liveness probe sent right after the port opens.
pub const PROBE: &str = "AT\r";

/// Hang up the current call.
pub const HANGUP: &str = "ATH\r";

/// Voice dial command for `number`.
///
/// ```
/// use sim_dialer::modem::protocol::dial;
///
/// assert_eq!(dial("+12345678901"), "ATD+12345678901;\r");
/// ```
#[must_use]
pub fn dial(number: &str) -> String {
    format!("ATD{number};\r")
}

/// Result codes that end the current voice call.
pub const CALL_ENDED_CODES: [&str; 4] = ["NO CARRIER", "BUSY", "NO ANSWER", "NO DIALTONE"];

/// What a response line means for modem readiness and the call in progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
    Ok,
    Error,
    /// The call in progress is over. Readiness is unaffected.
    CallEnded,
    /// Echoes, URCs and anything else with no effect on readiness.
    Unrecognized,
}

/// Classifies one response line.
///
/// Matching is by substring so that `+CME ERROR: 10` counts as an error.
/// A line carrying both tokens is treated as an error. Call ending result
/// codes only count when they make up the whole line.
#[must_use]
pub fn parse_response_line(line: &str) -> ResponseKind {
    if line.contains("ERROR") {
        ResponseKind::Error
    } else if CALL_ENDED_CODES.contains(&line.trim()) {
        ResponseKind::CallEnded
    } else if line.contains("OK") {
        ResponseKind::Ok
    } else {
        ResponseKind::Unrecognized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_bytes() {
        assert_eq!(PROBE.as_bytes(), b"AT\r");
        assert_eq!(HANGUP.as_bytes(), b"ATH\r");
        assert_eq!(dial("+447700900123").as_bytes(), b"ATD+447700900123;\r");
    }

    #[test]
    fn test_parse_ok() {
        assert_eq!(parse_response_line("OK"), ResponseKind::Ok);
        assert_eq!(parse_response_line("  OK  "), ResponseKind::Ok);
    }

    #[test]
    fn test_parse_error() {
        assert_eq!(parse_response_line("ERROR"), ResponseKind::Error);
        assert_eq!(parse_response_line("+CME ERROR: 10"), ResponseKind::Error);
    }

    #[test]
    fn test_parse_unrecognized() {
        assert_eq!(parse_response_line(""), ResponseKind::Unrecognized);
        assert_eq!(parse_response_line("AT"), ResponseKind::Unrecognized);
        assert_eq!(parse_response_line("RING"), ResponseKind::Unrecognized);
        assert_eq!(parse_response_line("+CPAS: 4"), ResponseKind::Unrecognized);
    }

    #[test]
    fn test_parse_call_ended() {
        assert_eq!(parse_response_line("NO CARRIER"), ResponseKind::CallEnded);
        assert_eq!(parse_response_line("BUSY\r"), ResponseKind::CallEnded);
        assert_eq!(parse_response_line(" NO ANSWER "), ResponseKind::CallEnded);
        assert_eq!(parse_response_line("NO DIALTONE"), ResponseKind::CallEnded);
        // Only whole result codes end a call.
        assert_eq!(parse_response_line("+CLCC: BUSY"), ResponseKind::Unrecognized);
    }
}
