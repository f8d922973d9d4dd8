pub mod batch;
pub mod linker;
pub mod outbound;
