/// CSV export of optimization passes.
pub mod export;

pub use export::PassCsvWriter;
