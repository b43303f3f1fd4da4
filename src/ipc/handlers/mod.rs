pub mod core;
pub mod exchange;
pub mod grades;
pub mod stats;
pub mod students;
pub mod subjects;
