pub mod store;
pub mod turn;

pub use store::{SessionStore, SessionView};
pub use turn::{ChatTurn, TurnRole};
