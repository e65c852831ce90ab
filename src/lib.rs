pub mod batch;
pub mod browser;
pub mod cli;
pub mod config;
pub mod export;
pub mod fetch;
pub mod logger;
pub mod platform;
pub mod records;
pub mod validator;

pub use batch::{run_batch, BatchOutcome, BatchSummary};
pub use browser::{ChromeRenderer, FixtureRenderer, PageRenderer};
pub use config::AppConfig;
pub use platform::{rewrite_to_origin, Platform, ValidationFailure, Verdict};
pub use validator::{LinkValidator, ValidationRules};
