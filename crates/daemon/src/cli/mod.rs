pub mod args;
pub mod op;
pub mod ops;

pub use ops::{Health, Init, Pins, Run, Version};
