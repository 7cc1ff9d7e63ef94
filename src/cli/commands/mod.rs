pub mod ask;
pub mod config;
pub mod market;
pub mod run;
pub mod status;
pub mod symbols;
pub mod sync;
