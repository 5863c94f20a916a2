pub mod engine;
pub mod hand;
pub mod replay;
pub mod sampler;
pub mod store;
