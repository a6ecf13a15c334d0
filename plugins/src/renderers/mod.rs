//! Progress listeners that turn runner events into terminal output.

mod fanout;
mod jsonl;
mod progress;
mod text;

pub use fanout::FanoutListener;
pub use jsonl::JsonlRenderer;
pub use progress::ProgressBarRenderer;
pub use text::TextRenderer;
