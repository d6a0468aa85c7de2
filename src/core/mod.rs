pub mod codec;
pub mod coerce;
pub mod query;
pub mod wizard;
