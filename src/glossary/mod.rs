pub mod dictionary;
pub mod entry;
pub mod matcher;
pub mod normalize;

pub use dictionary::*;
pub use entry::*;
pub use matcher::*;
pub use normalize::*;
