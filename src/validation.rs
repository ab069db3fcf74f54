/// Shared input checks for identifiers and frame payloads.

pub const MAX_SESSION_ID_LEN: usize = 64;
pub const MAX_LANDMARKS: usize = 1024;

/// Session ids become sled key prefixes, so `:` and other separators are refused.
pub fn validate_session_id(id: &str) -> Result<(), &'static str> {
    if id.is_empty() || id.len() > MAX_SESSION_ID_LEN {
        return Err("sessionId must be 1 to 64 characters");
    }
    if !id
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.')
    {
        return Err("sessionId may only contain letters, digits, '-', '_' and '.'");
    }
    Ok(())
}

pub fn validate_landmark_count(count: usize) -> Result<(), &'static str> {
    if count > MAX_LANDMARKS {
        return Err("too many landmarks in one frame");
    }
    Ok(())
}
