// disco-core/src/application/mod.rs

pub mod discoverer;
pub mod engine;
pub mod handler;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Cela permet au CLI de faire :
// `use disco_core::application::{Discoverer, Reactive};`
// sans avoir à connaître la structure interne des fichiers.

pub use discoverer::Discoverer;
pub use engine::Reactive;
