// crates/core/src/parser/mod.rs
//! Log interpretation: live transfer state and completed transfers.

pub mod completions;
pub mod live;
pub mod patterns;

pub use completions::CompletionExtractor;
pub use live::{current_match, current_state, session_activity, Activity, LiveMatch, Tier};
pub use patterns::{classify, MEDIA_EXTENSIONS};
