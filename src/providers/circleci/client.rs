mod core;
mod logs;
mod resources;

pub use self::core::CircleCiClient;
