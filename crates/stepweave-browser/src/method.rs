use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of atomic browser actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum BrowserMethod {
    /// Navigate to the URL given as instruction.
    Goto,
    /// Perform an interaction described in natural language.
    Act,
    /// Pull structured data matching the instruction from the page.
    Extract,
    /// Describe the page or the elements relevant to the instruction.
    Observe,
    /// Return the raw page markup.
    Html,
    Screenshot,
    /// Pause for the duration given as instruction (default one second).
    Wait,
    /// Go back to the previous page.
    NavBack,
    /// Reasoning step answered by the oracle alone; the page is untouched.
    AiHandle,
    /// Finish the browser task.
    Close,
}

impl BrowserMethod {
    pub const ALL: [BrowserMethod; 10] = [
        BrowserMethod::Goto,
        BrowserMethod::Act,
        BrowserMethod::Extract,
        BrowserMethod::Observe,
        BrowserMethod::Html,
        BrowserMethod::Screenshot,
        BrowserMethod::Wait,
        BrowserMethod::NavBack,
        BrowserMethod::AiHandle,
        BrowserMethod::Close,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BrowserMethod::Goto => "GOTO",
            BrowserMethod::Act => "ACT",
            BrowserMethod::Extract => "EXTRACT",
            BrowserMethod::Observe => "OBSERVE",
            BrowserMethod::Html => "HTML",
            BrowserMethod::Screenshot => "SCREENSHOT",
            BrowserMethod::Wait => "WAIT",
            BrowserMethod::NavBack => "NAVBACK",
            BrowserMethod::AiHandle => "AI_HANDLE",
            BrowserMethod::Close => "CLOSE",
        }
    }

    /// Only `CLOSE` ends the loop on its own.
    pub fn is_terminal(self) -> bool {
        self == BrowserMethod::Close
    }

    /// Methods whose output is collected as extracted data.
    pub fn produces_data(self) -> bool {
        matches!(
            self,
            BrowserMethod::Extract | BrowserMethod::Html | BrowserMethod::Observe
        )
    }

    /// Methods that cannot run without an instruction.
    pub fn requires_instruction(self) -> bool {
        matches!(
            self,
            BrowserMethod::Goto | BrowserMethod::Act | BrowserMethod::Extract | BrowserMethod::AiHandle
        )
    }
}

impl fmt::Display for BrowserMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown browser method '{0}'")]
pub struct UnknownMethod(pub String);

impl FromStr for BrowserMethod {
    type Err = UnknownMethod;

    /// Case-insensitive; `-` and spaces are read as `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "GOTO" => Ok(BrowserMethod::Goto),
            "ACT" => Ok(BrowserMethod::Act),
            "EXTRACT" => Ok(BrowserMethod::Extract),
            "OBSERVE" => Ok(BrowserMethod::Observe),
            "HTML" => Ok(BrowserMethod::Html),
            "SCREENSHOT" => Ok(BrowserMethod::Screenshot),
            "WAIT" => Ok(BrowserMethod::Wait),
            "NAVBACK" | "NAV_BACK" => Ok(BrowserMethod::NavBack),
            "AI_HANDLE" => Ok(BrowserMethod::AiHandle),
            "CLOSE" => Ok(BrowserMethod::Close),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for BrowserMethod {
    type Error = UnknownMethod;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BrowserMethod> for &'static str {
    fn from(method: BrowserMethod) -> Self {
        method.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("GOTO", BrowserMethod::Goto)]
    #[case("extract", BrowserMethod::Extract)]
    #[case(" Observe ", BrowserMethod::Observe)]
    #[case("NAVBACK", BrowserMethod::NavBack)]
    #[case("nav-back", BrowserMethod::NavBack)]
    #[case("ai_handle", BrowserMethod::AiHandle)]
    #[case("AI HANDLE", BrowserMethod::AiHandle)]
    #[case("close", BrowserMethod::Close)]
    fn parses_method_names(#[case] input: &str, #[case] expected: BrowserMethod) {
        assert_eq!(input.parse::<BrowserMethod>().unwrap(), expected);
    }

    #[rstest]
    #[case("CLICK")]
    #[case("")]
    #[case("GO TO")]
    fn rejects_unknown_names(#[case] input: &str) {
        assert!(input.parse::<BrowserMethod>().is_err());
    }

    #[test]
    fn display_round_trips_through_parse() {
        for method in BrowserMethod::ALL {
            assert_eq!(method.to_string().parse::<BrowserMethod>().unwrap(), method);
        }
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&BrowserMethod::AiHandle).unwrap();
        assert_eq!(json, "\"AI_HANDLE\"");
        let parsed: BrowserMethod = serde_json::from_str("\"extract\"").unwrap();
        assert_eq!(parsed, BrowserMethod::Extract);
        assert!(serde_json::from_str::<BrowserMethod>("\"FLY\"").is_err());
    }

    #[test]
    fn only_close_is_terminal() {
        let terminal: Vec<_> = BrowserMethod::ALL.iter().filter(|m| m.is_terminal()).collect();
        assert_eq!(terminal, vec![&BrowserMethod::Close]);
    }
}
