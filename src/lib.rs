pub mod aggregate;
pub mod config;
pub mod domain;
pub mod error;
pub mod iem;
pub mod nwm;
pub mod pipeline;
pub mod schedule;
pub mod shef;
pub mod store;
