//! Taskweave CLI library — command implementations shared by the `taskweave`
//! binary and its integration tests.

pub mod commands;
