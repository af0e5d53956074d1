pub mod shutdown;
pub mod validation;
