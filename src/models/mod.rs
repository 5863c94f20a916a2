pub mod events;
pub mod geometry;
pub mod level;
pub mod settings;
pub mod words;
