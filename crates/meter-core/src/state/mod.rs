//! Published snapshot state.

pub mod store;

pub use store::StateStore;
