//! Selective-repeat ARQ over an unreliable datagram channel.
//!
//! [`layer`] holds the sending and receiving engines. They never touch a
//! socket or a clock themselves: every call takes the collaborators it needs.
//! [`sim`] drives a pair of engines across a lossy, corrupting, reordering
//! channel on a virtual clock.

pub mod layer;
pub mod protocol;
pub mod sim;
pub mod utils;

#[cfg(test)]
mod test_util;
