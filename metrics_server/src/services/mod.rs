//! Background and write-side services: bulk load, aggregation, scheduling.

pub mod aggregation_service;
pub mod load_service;
pub mod scheduler;
