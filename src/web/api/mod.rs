pub mod camera;
pub mod error;
pub mod mode;
