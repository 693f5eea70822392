pub mod c03;
pub mod c08;
