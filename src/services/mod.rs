pub mod dispatcher;
pub mod proxy;
pub mod relay;
pub mod transport;
