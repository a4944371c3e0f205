//! A runtime of compute actors that exchange registers.
//!
//! Every actor owns pools of registers for what it produces and borrows the registers of
//! what it consumes. An actor fires when each of its inputs has a register waiting and
//! each of its outputs has a free one, so the capacity of the pools is what bounds the
//! work in flight.

pub mod actor;
pub mod config;
mod error;
pub mod initialization;
pub mod kernel;
pub mod optimization;
pub mod register;
pub mod runtime;

pub use error::{ActorErr, Result};
