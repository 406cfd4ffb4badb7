pub mod council;
pub mod factory;

pub use council::CouncilHandler;
pub use factory::FactoryHandler;
