pub mod cleanup;
pub mod converters;
pub mod delivery;
pub mod janitor;
pub mod staging;
