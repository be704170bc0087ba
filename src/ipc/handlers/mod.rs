pub mod calendar;
pub mod core;
pub mod grades;
pub mod reference;
pub mod schedule;
