pub mod artifacts;
pub mod image_prep;
pub mod pipeline;
pub mod ranker;
pub mod stability;
pub mod types;
pub mod ui_hierarchy;
