use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::panic::Location as PanicLocation;

/// Source position captured where an error was constructed.
///
/// Built from `Location::caller()` inside `#[track_caller]` functions so the
/// reported position is the call site, not the conversion helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorLocation {
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

impl ErrorLocation {
    pub const fn from(location: &'static PanicLocation<'static>) -> Self {
        Self {
            file: location.file(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl Display for ErrorLocation {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        write!(formatter, "[{}:{}:{}]", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorLocation;

    use std::panic::Location;

    /// **VALUE**: Verifies that the location renders as `[file:line:column]`.
    ///
    /// **BUG THIS CATCHES**: Would catch a change to the Display format that breaks
    /// every error message in the workspace (they all append `{location}`).
    #[test]
    fn given_caller_location_when_displayed_then_uses_bracketed_format() {
        // GIVEN: A location captured at this call site
        let location = ErrorLocation::from(Location::caller());

        // WHEN: Formatting it
        let rendered = location.to_string();

        // THEN: Should be bracketed and carry the file name
        assert!(rendered.starts_with('['));
        assert!(rendered.ends_with(']'));
        assert!(rendered.contains(location.file));
        assert!(rendered.contains(&format!(":{}:", location.line)));
    }
}
