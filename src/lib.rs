pub mod appsettings;
pub mod cli;
pub mod delivery;
pub mod scheduling;
pub mod storage;
pub mod task;

#[cfg(test)]
mod test_utils;
