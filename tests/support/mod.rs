#![allow(dead_code)]

pub mod covermap_env;
pub mod http;
