#![allow(dead_code)]

pub mod log_server;
