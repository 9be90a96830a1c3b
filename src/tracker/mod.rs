//! Tracking domain. A [record::TimeRecord] accumulates time for one project, a
//! [ledger::DayLedger] is the stored snapshot of one date, [session::Session] drives a day of
//! tracking and [report] sums ledgers over a range of dates.

pub mod duration;
pub mod ledger;
pub mod record;
pub mod report;
pub mod session;
