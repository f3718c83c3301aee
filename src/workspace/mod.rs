mod store;

pub use store::RunStore;
