use console::{style, StyledObject};

/// Colour of a build status or test result as reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed,
    Other,
}

impl Outcome {
    pub fn classify(result: &str) -> Self {
        match result.to_ascii_uppercase().as_str() {
            "SUCCESS" | "PASSED" | "OK" => Self::Passed,
            "FAILURE" | "FAILED" | "ERROR" | "TIMED_OUT" | "POST_FAILURE" => Self::Failed,
            _ => Self::Other,
        }
    }
}

/// Field and entity labels (`Tenant: `).
pub fn label(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn outcome(text: &str) -> StyledObject<String> {
    let styled = style(text.to_string());
    match Outcome::classify(text) {
        Outcome::Passed => styled.bright().green(),
        Outcome::Failed => styled.bright().red(),
        Outcome::Other => styled.yellow(),
    }
}

/// Feature presence flags.
pub fn presence(present: bool) -> StyledObject<String> {
    if present {
        style(present.to_string()).bright().green()
    } else {
        style(present.to_string()).bright().red()
    }
}

/// Spinner messages.
pub fn progress(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

/// Footers and secondary banner text.
pub fn subtle(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn title(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}
