pub mod billing;
pub mod resume;
