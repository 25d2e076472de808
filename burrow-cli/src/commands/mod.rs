pub mod tunnel;
pub mod version;
