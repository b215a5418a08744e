//! Error text for failed responses

use http::StatusCode;

/// Keep an explicit error, or synthesize a reason phrase for codes >= 400
pub fn error_for_status(status: u16, error: Option<String>) -> Option<String> {
    match error {
        Some(error) if !error.is_empty() => Some(error),
        _ if status >= 400 => Some(reason_phrase(status)),
        _ => None,
    }
}

/// Canonical reason phrase, or `"Unknown status N"`
pub fn reason_phrase(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .map_or_else(|| format!("Unknown status {status}"), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_error_wins() {
        assert_eq!(
            error_for_status(500, Some("timeout".into())).as_deref(),
            Some("timeout")
        );
    }

    #[test]
    fn test_synthesized_reason() {
        assert_eq!(error_for_status(503, None).as_deref(), Some("Service Unavailable"));
        assert_eq!(error_for_status(404, Some(String::new())).as_deref(), Some("Not Found"));
    }

    #[test]
    fn test_success_has_no_error() {
        assert_eq!(error_for_status(200, None), None);
        assert_eq!(error_for_status(399, None), None);
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(reason_phrase(599), "Unknown status 599");
        assert_eq!(reason_phrase(1200), "Unknown status 1200");
    }
}
