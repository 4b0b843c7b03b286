//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, adb
//! access, AVD cloning, emulator launching, and config persistence.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod adb;
pub mod avd;
pub mod clock;
pub mod command_runner;
pub mod config;
pub mod emulator;
