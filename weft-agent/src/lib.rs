pub mod executor;
pub mod mock;

pub use executor::TurnExecutor;
pub use mock::{EchoLlm, MockLlm};
