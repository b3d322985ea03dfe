mod store;

pub use store::InterestStore;
