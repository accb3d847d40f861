//! Infrastructure layer — concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, the
//! image store, the hypervisor process, SSH, sshfs and host resources.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod backend;
pub mod command_runner;
pub mod config;
pub mod identity;
pub mod image;
pub mod network;
pub mod qemu;
pub mod ssh;
pub mod sshfs;
