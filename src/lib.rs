pub mod app;
pub mod cli;
pub mod copilot;
pub mod error;
pub mod models;
pub mod server;
pub mod services;
pub mod sources;
pub mod strategies;
pub mod utils;

pub use app::App;
pub use cli::{Cli, Commands};
pub use copilot::Copilot;
pub use error::AppError;
pub use models::{AnswerResponse, Config, OutputFormat};
