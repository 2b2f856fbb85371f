pub mod kinds;
pub mod match_event;
pub mod plan;
