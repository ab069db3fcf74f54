pub fn session_key(session_id: &str) -> String {
    session_id.to_string()
}

/// Zero-padded so lexicographic order matches frame order.
pub fn frame_key(session_id: &str, frame_number: u64) -> String {
    format!("{}:{:020}", session_id, frame_number)
}

pub fn frame_prefix(session_id: &str) -> String {
    format!("{}:", session_id)
}
