pub mod logging;
pub mod validation;
