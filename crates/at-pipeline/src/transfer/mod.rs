//! Moving finished downloads into the library

mod fs;
mod paths;

pub use fs::{apply_ownership, transfer_item, Ownership, LIBRARY_MODE};
pub use paths::{
    generate_movie_target_path, generate_tv_season_paths, generate_tv_show_paths, normalize_codec,
    plan_transfer, slugify, TransferMode, TransferPlan,
};
