pub mod app;
pub mod config;
pub mod domain;
pub mod repository;
pub mod review;
pub mod routes;
pub mod sync;
pub mod utils;
