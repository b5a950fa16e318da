//! Flows layer

mod acceptor;
mod instigator;

pub use acceptor::StateReplacementAcceptor;
pub use instigator::StateReplacementInstigator;
