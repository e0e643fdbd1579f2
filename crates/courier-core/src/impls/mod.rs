//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryBus**: プロセス内の BusTransport（endpoint の対）
//! - **InMemoryDataIndex**: 開発用の DataIndex
//! - **RecordingNavigator**: 遷移先を記録するだけの Navigator
//!
//! ブラウザ上の実装（window.postMessage, GraphQL client）はこのクレートの範囲外です。

pub mod inmem_bus;
pub mod inmem_data_index;
pub mod recording_navigator;

pub use self::inmem_bus::{BusEndpoint, InMemoryBus};
pub use self::inmem_data_index::InMemoryDataIndex;
pub use self::recording_navigator::RecordingNavigator;
