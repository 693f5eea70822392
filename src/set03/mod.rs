pub mod c17;
