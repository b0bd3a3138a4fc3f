pub mod flat;
pub mod gatherer;
pub mod location;
pub mod mesh;
