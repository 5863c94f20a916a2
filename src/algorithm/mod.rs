pub mod attention;
pub mod intent;
pub mod nearest_word;
pub mod projector;
pub mod warp;
