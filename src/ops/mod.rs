pub mod batch;
pub mod check;
pub mod cycle;
pub mod hierarchy;
pub mod mode;
pub mod propagate;
pub mod recurrence;
pub mod visibility;
