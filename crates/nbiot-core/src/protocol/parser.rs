//! Response decomposition
//!
//! Turns the text of a successful response into a command name and its
//! parameters, e.g. `"+CSQ: 15,99\r\nOK\r\n"` becomes `+CSQ` with
//! `["15", "99"]`. Decomposition is total: malformed text still yields a
//! value, and judging whether the parameters make sense is left to callers.

use std::str::FromStr;

use super::ProtocolError;

/// Separator between the command name and its parameters
const NAME_SEPARATOR: &str = ": ";

/// A decomposed modem response
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedResponse {
    /// Token before the first `": "` (or the whole first line)
    pub command_name: String,
    /// Comma-separated values after the separator, quotes removed
    pub parameters: Vec<String>,
}

impl ParsedResponse {
    /// Decompose a response text
    pub fn parse(text: &str) -> Self {
        decompose(text)
    }

    /// Parameter at `index`, if present
    pub fn param(&self, index: usize) -> Option<&str> {
        self.parameters.get(index).map(String::as_str)
    }

    /// Last parameter, if any
    pub fn last_param(&self) -> Option<&str> {
        self.parameters.last().map(String::as_str)
    }

    /// Parse the parameter at `index` into `T`.
    ///
    /// `command` is only used to build the error message.
    pub fn param_as<T: FromStr>(&self, index: usize, command: &str) -> Result<T, ProtocolError> {
        let raw = self
            .param(index)
            .ok_or_else(|| ProtocolError::InvalidResponse {
                command: command.to_string(),
                reason: format!("missing parameter {} in {:?}", index, self.parameters),
            })?;
        raw.parse::<T>().map_err(|_| ProtocolError::InvalidResponse {
            command: command.to_string(),
            reason: format!("parameter {} ({:?}) is not a valid value", index, raw),
        })
    }
}

/// Split a response into `(command_name, parameters)`.
///
/// Only the first line counts; the modem appends status lines (`OK`, blank
/// lines) after the information line.
pub fn decompose(text: &str) -> ParsedResponse {
    let stripped = text.trim_matches(|c| c == '\r' || c == '\n');
    let first_line = stripped.split("\r\n").next().unwrap_or_default();

    match first_line.split_once(NAME_SEPARATOR) {
        Some((name, rest)) => ParsedResponse {
            command_name: name.trim().to_string(),
            parameters: rest.split(',').map(clean_parameter).collect(),
        },
        None => ParsedResponse {
            command_name: first_line.trim().to_string(),
            parameters: Vec::new(),
        },
    }
}

/// Trim whitespace, then one pair of surrounding double quotes
fn clean_parameter(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_signal_quality_response() {
        let parsed = decompose("+CSQ: 15,99\r\nOK\r\n");
        assert_eq!(parsed.command_name, "+CSQ");
        assert_eq!(parsed.parameters, strings(&["15", "99"]));
    }

    #[test]
    fn test_leading_blank_lines_are_stripped() {
        let parsed = decompose("\r\n+CGATT: 1\r\n\r\nOK\r\n");
        assert_eq!(parsed.command_name, "+CGATT");
        assert_eq!(parsed.parameters, strings(&["1"]));
    }

    #[test]
    fn test_no_separator_yields_no_parameters() {
        let parsed = decompose("OK\r\n");
        assert_eq!(parsed.command_name, "OK");
        assert!(parsed.parameters.is_empty());
    }

    #[test]
    fn test_empty_parameter_section_yields_one_empty_parameter() {
        let parsed = decompose("+CMQNEW: \r\nOK\r\n");
        assert_eq!(parsed.command_name, "+CMQNEW");
        assert_eq!(parsed.parameters, strings(&[""]));
    }

    #[test]
    fn test_quotes_and_whitespace_are_trimmed() {
        let parsed = decompose("+CGCONTRDP: 1,5,\"nbiot\", \"10.0.0.2\" \r\nOK\r\n");
        assert_eq!(parsed.command_name, "+CGCONTRDP");
        assert_eq!(parsed.parameters, strings(&["1", "5", "nbiot", "10.0.0.2"]));
    }

    #[test]
    fn test_only_one_pair_of_quotes_is_removed() {
        let parsed = decompose("+X: \"\"inner\"\"\r\nOK\r\n");
        assert_eq!(parsed.parameters, strings(&["\"inner\""]));
    }

    #[test]
    fn test_lone_quote_is_kept() {
        let parsed = decompose("+X: \"abc\r\nOK\r\n");
        assert_eq!(parsed.parameters, strings(&["\"abc"]));
    }

    #[test]
    fn test_split_happens_on_first_separator_only() {
        let parsed = decompose("+CMQPUB: 0,\"ds/Lamp\",1,0,0,2,\"a: b\"\r\nOK\r\n");
        assert_eq!(parsed.command_name, "+CMQPUB");
        assert_eq!(
            parsed.parameters,
            strings(&["0", "ds/Lamp", "1", "0", "0", "2", "a: b"])
        );
    }

    #[test]
    fn test_trailing_lines_are_discarded() {
        let parsed = decompose("+CGATT: 1\r\n+CEREG: 1\r\nOK\r\n");
        assert_eq!(parsed.command_name, "+CGATT");
        assert_eq!(parsed.parameters, strings(&["1"]));
    }

    #[test]
    fn test_empty_text() {
        assert_eq!(decompose(""), ParsedResponse::default());
        assert_eq!(decompose("\r\n\r\n"), ParsedResponse::default());
    }

    #[test]
    fn test_param_as() {
        let parsed = decompose("+CSQ: 15,99\r\nOK\r\n");
        assert_eq!(parsed.param_as::<u8>(0, "AT+CSQ").unwrap(), 15);
        assert_eq!(parsed.param_as::<u8>(1, "AT+CSQ").unwrap(), 99);
        assert!(parsed.param_as::<u8>(2, "AT+CSQ").is_err());

        let bad = decompose("+CSQ: abc\r\nOK\r\n");
        let err = bad.param_as::<u8>(0, "AT+CSQ").unwrap_err();
        assert!(err.to_string().contains("AT+CSQ"));
    }
}
