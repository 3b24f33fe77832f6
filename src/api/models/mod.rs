pub mod report;

pub use report::{AnalysisReport, LipsyncReport, MarkerReport};
