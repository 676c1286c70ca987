//! Status icons shared by the commands.

use console::{style, StyledObject};

/// Green ✓.
pub fn success() -> StyledObject<&'static str> {
    style("✓").green()
}

/// Cyan →.
pub fn info() -> StyledObject<&'static str> {
    style("→").cyan()
}

/// Yellow !.
pub fn warn() -> StyledObject<&'static str> {
    style("!").yellow()
}

/// Red ✗.
pub fn error() -> StyledObject<&'static str> {
    style("✗").red()
}

/// Dim →, for secondary lines.
pub fn dim_arrow() -> StyledObject<&'static str> {
    style("→").dim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn icons_render_their_glyphs() {
        assert!(success().to_string().contains('✓'));
        assert!(error().to_string().contains('✗'));
        assert!(info().to_string().contains('→'));
        assert!(warn().to_string().contains('!'));
        assert!(dim_arrow().to_string().contains('→'));
    }
}
