pub mod address;
pub mod column;
pub mod record;
pub mod value;
