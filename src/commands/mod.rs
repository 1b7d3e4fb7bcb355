mod config_cmd;
mod run_cmd;

pub use config_cmd::ConfigCommand;
pub use run_cmd::RunCommand;
