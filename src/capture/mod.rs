pub mod pipeline;
pub mod region;
pub mod state;
