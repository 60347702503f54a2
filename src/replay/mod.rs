pub mod executor;

pub use executor::{ReplayTiming, ScriptPlayer};
