//! Command tests for backup-keeper
//!
//! These tests drive each command's flow through the library on local disks
//! in temp directories.

mod clean;
