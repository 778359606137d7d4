//! Rolling 3-day meal planner.
//!
//! The plan covers today and the next two days. Each run first moves the
//! stored plan onto the current window ([`window::migrate`]), archiving days
//! that have passed, then applies whatever edit was asked for.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod legacy;
pub mod plan;
pub mod planner;
pub mod store;
pub mod view;
pub mod window;
