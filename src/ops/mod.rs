pub mod advisory;
pub mod backup;
pub mod due;
pub mod limits;
pub mod pipeline;
pub mod reconcile;
pub mod scan;
pub mod timer;
