pub mod c09;
pub mod c14;
pub mod c15;
