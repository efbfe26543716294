pub mod decision;
pub mod event;
pub mod review;
pub mod thresholds;
