pub const SESSIONS: &str = "sessions";
pub const FRAMES: &str = "frames";
