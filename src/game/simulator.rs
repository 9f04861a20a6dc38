//! Balance simulator for Money Printer.
//! Run with: cargo test simulate_greedy -- --nocapture
