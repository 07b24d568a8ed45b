mod doctor;
mod render;
mod serve;

pub use doctor::run_doctor;
pub use render::{run_render, RenderArgs};
pub use serve::run_serve;
