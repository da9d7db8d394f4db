pub mod down;
pub mod graph;
pub mod plan;
pub mod script;
pub mod status;
pub mod up;
pub mod validate;
