// crates/core/src/lib.rs
pub mod device;
pub mod error;
pub mod history;
pub mod parser;
pub mod sanitize;
pub mod size;
pub mod tail;

pub use device::read_device_name;
pub use error::*;
pub use history::{History, HistoryStore, MergeOutcome};
pub use parser::{current_state, CompletionExtractor};
pub use tail::{read_window, TailCursor};
