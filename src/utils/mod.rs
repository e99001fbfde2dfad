pub mod errors;
pub mod math_utils;
pub mod validation;
