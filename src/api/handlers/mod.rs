pub mod ai;
pub mod budget;
pub mod classes;
pub mod core;
pub mod dashboard;
pub mod planner;
pub mod questions;
mod resource;
pub mod users;
