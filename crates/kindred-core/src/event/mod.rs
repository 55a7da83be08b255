//! Pipeline event distribution.

pub mod bus;
