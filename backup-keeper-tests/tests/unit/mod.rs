//! Unit test suite
//!
//! Exercises library building blocks against in-memory and temp-dir disks.

mod cleanup;
mod config;
mod destination;
mod health;
