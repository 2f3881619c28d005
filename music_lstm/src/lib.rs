#![recursion_limit = "256"]

pub mod checkpoint;
pub mod config;
pub mod corpus;
pub mod data;
pub mod error;
pub mod generation;
pub mod inference;
pub mod metrics;
pub mod midi;
pub mod model;
pub mod pitch;
pub mod score;
pub mod session;
pub mod training;
pub mod vocabulary;
pub mod web;
