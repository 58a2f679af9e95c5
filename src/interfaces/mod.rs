pub mod transport;
pub mod wallet;
