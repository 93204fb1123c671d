pub mod engine;

pub use engine::AlertEngine;
