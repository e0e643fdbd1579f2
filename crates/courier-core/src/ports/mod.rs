//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! - bus の配送路（BusTransport）
//! - ID / 時刻（IdGenerator, Clock）
//! - Driver が委譲する host アプリケーションの機能（DataIndex, Navigator）

pub mod clock;
pub mod data_index;
pub mod id_generator;
pub mod navigator;
pub mod transport;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::data_index::{DataIndex, DataIndexError};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::navigator::{NavigationError, Navigator};
pub use self::transport::{BusTransport, Inbound, IncomingMessage, TransportError};
