/// Error types shared by every track source implementation.
pub mod source;
/// Fetch capability used to assemble track pools.
pub mod track_source;
