pub mod active;
pub mod codec;
pub mod commands;
pub mod doctor;
pub mod error;
pub mod fs_utils;
pub mod locate;
pub mod logging;
pub mod paths;
pub mod probe;
pub mod profile;
pub mod refresh;
pub mod rotation;
pub mod store;
pub mod switch;
pub mod ui;

#[cfg(test)]
pub mod test_utils;
