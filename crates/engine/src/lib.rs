pub mod autofill;
pub mod dragfill;
pub mod error;
pub mod events;
pub mod filter;
pub mod grid;
pub mod ledger;
pub mod options;
pub mod validate;
pub mod window;

#[cfg(test)]
pub mod harness;
