#![allow(dead_code)]

pub mod fake_drivers;
pub mod kubo_server;
