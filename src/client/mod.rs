pub mod connector;
pub mod faucet;

pub use connector::normalize_user_id;
pub use faucet::{FaucetClient, FaucetService};
