// Pure text utilities shared by the tailoring pipeline and the analysis tools.
// Nothing in here touches the network or the database.

pub mod ats_sanitizer;
pub mod diff;
pub mod job_description;
pub mod json_extract;
