//! Facebook platform.

mod descriptor;
mod recipes;

pub use descriptor::facebook_descriptor;
pub use recipes::fdown_recipe;
