pub mod rv32;
