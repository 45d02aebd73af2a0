pub mod activity_controller;

pub use activity_controller::configure;
