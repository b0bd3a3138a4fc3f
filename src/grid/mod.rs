pub mod allocator;
pub mod congestion;
pub mod constants;
pub mod populate;
pub mod spatial;
pub mod zones;
