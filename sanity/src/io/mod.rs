pub mod completion;
pub mod config;
pub mod environment;
pub mod ignore_file;
pub mod process;
pub mod sandbox;
pub mod scratch;
