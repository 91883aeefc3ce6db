pub mod coordinate_system;
pub mod render_settings;
pub mod viewshed;
