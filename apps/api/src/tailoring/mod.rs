// Resume tailoring: rewrite against a JD, score, lock behind the paywall, persist.
pub mod handlers;
pub mod pipeline;
pub mod prompts;
