//! Client library for FSR pad sensor arrays.
//!
//! Talks to a pad backend over a resilient duplex JSON link, keeps a
//! bounded rolling history of multi-channel readings, and drives the
//! per-channel panels (rendering, threshold editing) of a live dashboard.

pub mod history;
pub mod link;
pub mod panel;
pub mod proto;
pub mod thresholds;
