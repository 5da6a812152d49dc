pub mod adb;
pub mod bridge;
pub mod coordinator;
pub mod retry;
pub mod text_input;
