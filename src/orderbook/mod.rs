pub mod tracker;

pub use tracker::OrderBookTracker;
