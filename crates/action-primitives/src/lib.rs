//! Action Primitives - Device actions and the controller contract
//!
//! This crate provides the building blocks every device backend shares:
//! - A closed set of actions (click, swipe, key press, launch, wait, assert, click-template)
//! - The `Controller` contract with type-level and runtime capability sets
//! - Exhaustive dispatch from action to controller operation with deadlines

mod controller;
mod dispatch;
pub mod errors;
pub mod types;

pub use controller::*;
pub use dispatch::*;
pub use errors::*;
pub use types::*;
