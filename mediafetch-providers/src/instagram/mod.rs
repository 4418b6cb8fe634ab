//! Instagram platform.

mod descriptor;
mod recipes;

pub use descriptor::instagram_descriptor;
pub use recipes::snapinsta_recipe;
