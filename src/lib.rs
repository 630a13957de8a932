pub mod app;
pub mod camera;
pub mod config;
pub mod loopback;
pub mod my_types;
pub mod overlay;
pub mod passthrough;
pub mod session;
pub mod timer;
pub mod track_log;
pub mod tracker;
pub mod visualization;
