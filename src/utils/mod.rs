mod seq;
mod timer_ledger;

pub use seq::*;
pub use timer_ledger::*;
