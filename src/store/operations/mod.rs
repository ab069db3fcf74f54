pub mod frames;
pub mod sessions;
