pub mod raw_def;
