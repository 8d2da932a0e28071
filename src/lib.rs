pub mod airspace;
pub mod config;
pub mod error;
pub mod events;
pub mod flight;
pub mod geo;
pub mod kinematics;
pub mod publisher;
pub mod rng;
pub mod scheduler;
pub mod sector_state;
pub mod spawn_listener;
pub mod store;
pub mod telemetry;
