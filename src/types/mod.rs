pub mod currency;
pub mod ids;
pub mod money;
pub mod price;
pub mod timestamp;
