pub mod campaign;
pub mod donation;
