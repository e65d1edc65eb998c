// Stored resumes: upload parsing, listing, versions, feedback and unlocking.
pub mod handlers;
pub mod repository;
pub mod upload;
