//! different utility modules used throughout the project
/// csv output of trajectories and log initialization
pub mod logger;
/// plain png charts of trajectories and sweep results
pub mod plots;
/// parse document with structure like " title1 key1: value1, value2 key2: value2 title2 key3:value3, value4"
pub mod task_parser;
