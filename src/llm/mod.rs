pub mod action_parser;
pub mod prompts;
pub mod provider;
pub mod providers;
pub mod types;
