pub mod normalize;
pub mod processor;
pub mod script;
pub mod state;
pub mod target;
