pub mod data_fetcher;
pub mod form_stats;
pub mod frequency;
pub mod ingest;
pub mod model_selector;
pub mod notifier;
pub mod over_under;
pub mod pipeline;
pub mod predictor;
pub mod regression;
pub mod report;

pub use data_fetcher::DataFetcher;
pub use form_stats::FormStatsBuilder;
pub use notifier::{deliver_all, notifier_from_settings};
pub use pipeline::{over_under_stored, predict_stored};
pub use predictor::PredictionEngine;
pub use report::{Report, ReportAssembler};
