#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]
pub mod config;
pub mod database;
pub mod rates;

#[path = "../study/mod.rs"]
pub mod study;
