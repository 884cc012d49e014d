pub mod cluster;
pub mod config;
pub mod error;
pub mod export;
pub mod imputation;
pub mod model;
pub mod pipeline;
pub mod ranking;
pub mod reshape;
pub mod roster;
pub mod season;
pub mod sheet;
pub mod store;
pub mod views;
