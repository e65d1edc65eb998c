// Locked-resume preview: section partitioning, free-reveal selection, and the
// token/content-map obfuscation that gates the full tailored resume behind payment.

pub mod free_reveal;
pub mod obfuscator;
pub mod sections;

pub use free_reveal::FreeReveal;
pub use obfuscator::{obfuscate, reconstruct, ObfuscatedResume, ObfuscationError};
