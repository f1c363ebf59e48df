pub mod annotate;
pub mod config;
pub mod dedup;
pub mod pass;
pub mod popup;
pub mod scan;
pub mod schedule;
pub mod section;
pub mod tree;

pub use annotate::*;
pub use config::*;
pub use dedup::*;
pub use pass::*;
pub use popup::*;
pub use scan::*;
pub use schedule::*;
pub use section::*;
pub use tree::*;
