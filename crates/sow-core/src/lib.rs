//! Core types and scheduling for Schemes of Work.
//!
//! Turns a week/lesson teaching calendar into a linear sequence of slots
//! ([`calendar`]), removes term breaks ([`breaks`]), distributes weighted
//! curriculum topics over the remaining teaching slots ([`allocator`]), and
//! defines the lesson/scheme data model plus JSON persistence.

pub mod allocator;
pub mod breaks;
pub mod calendar;
pub mod config;
pub mod curriculum;
pub mod model;
pub mod request;
pub mod schema;
pub mod storage;
