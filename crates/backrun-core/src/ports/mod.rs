//! Ports - seams between the dispatcher and the outside world.

pub mod broker;
pub mod clock;
pub mod id_generator;
pub mod strategy;

pub use self::broker::{Broker, BrokerError};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::strategy::{ExecutionStrategy, StrategyKind};
