pub mod hotspots;
pub mod rules;
