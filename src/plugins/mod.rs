pub mod combat;
pub mod enemies;
pub mod level;
pub mod movement;
pub mod safe_zone;
pub mod target;
pub mod telemetry;
