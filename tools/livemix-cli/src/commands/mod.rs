pub mod info;
pub mod simulate;
pub mod validate;
