mod connection;
mod factory;

pub use connection::MonitoredConnection;
pub use factory::{
    BoxedResourceHandleProvider, DummyResourceHandleProvider,
    RedisCommunicationFactory, ResourceHandleProvider,
};
