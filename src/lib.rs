//! Per-project time tracking from the terminal.
//! Time is logged per day into ledgers that can later be summed into reports over any range of
//! dates.
//!

pub mod cli;
pub mod fs;
pub mod storage;
pub mod tracker;
pub mod utils;
