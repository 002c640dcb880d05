pub mod analyze;
pub mod check_config;
pub mod export;
pub mod generate;
pub mod impact;
pub mod publish;
pub mod validate;
