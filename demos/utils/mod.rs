//! Utility functions for the demos
//!
//! Interface configuration for the TUN device and a stderr logger.

pub mod network;
