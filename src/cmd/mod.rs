//! One-shot CLI subcommands.

pub mod check;
pub mod history;

pub use check::CheckArgs;
pub use history::HistoryArgs;
