pub mod classifier;
pub mod dialogue;
pub mod extractor;
pub mod models;
pub mod patterns;

pub use classifier::{classify, Classification, ScoringConfig};
pub use dialogue::{advance, select_reply};
pub use extractor::extract;
pub use models::*;
pub use patterns::ScamCategory;
