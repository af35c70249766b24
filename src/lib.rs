#![allow(unused_assignments)] // thiserror/miette proc macros trigger false positives

pub mod actions;
pub mod auth;
pub mod catalog;
pub mod cli;
pub mod compute;
pub mod config;
pub mod convert;
pub mod error;
pub mod inventory;
pub mod license;
pub mod logging;
pub mod menu;
pub mod observer;
pub mod paths;
pub mod reconcile;
pub mod verify;
pub mod wait;
