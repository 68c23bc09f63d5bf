pub mod defer;

pub use defer::DeferStack;
