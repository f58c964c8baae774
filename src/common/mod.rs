//! Shared filesystem utilities used by every installer.

pub mod files;
pub mod paths;
pub mod temp;

pub use files::{
    is_executable, make_executable, move_into_place, replace_symlink, size_mb,
    write_file_atomic, write_file_mode,
};
pub use paths::{relative_target, Layout};
pub use temp::{cleanup_work_dir, prepare_work_dir};
