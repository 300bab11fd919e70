pub mod aggregate;
pub mod catalog;
pub mod diagnostics;
pub mod ignore;
pub mod resolver;
pub mod selector;
pub mod types;
