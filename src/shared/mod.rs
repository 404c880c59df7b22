pub const BRANCH_PREFIX: &str = "werft";

/// Isolation branches are derived deterministically from the session id so a
/// session can always be matched back to its branch without a registry read.
pub fn format_branch_name(session_id: &str) -> String {
    format!("{BRANCH_PREFIX}/{session_id}")
}

pub fn format_tab_branch_name(session_id: &str, tab_id: &str) -> String {
    format!("{BRANCH_PREFIX}/{session_id}/{tab_id}")
}

/// Session and tab ids double as path components and branch segments.
pub fn is_valid_component_id(id: &str) -> bool {
    if id.is_empty() || id.len() > 100 {
        return false;
    }

    let first_char = id.chars().next().unwrap();
    if !first_char.is_ascii_alphanumeric() && first_char != '_' {
        return false;
    }

    id.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}
