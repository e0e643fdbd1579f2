//! courier-core
//!
//! Host/guest messaging for embedded views (micro-frontends).
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, origin, association, container, envelope message, state, errors）
//! - **ports**: 抽象化レイヤー（BusTransport, IdGenerator, Clock, DataIndex, Navigator）
//! - **app**: bus の両端（EnvelopeServer, Envelope, MessageManager, builder）
//! - **typed**: 型付き API（ApiContract, ApiHandler, ApiClient, PayloadCodec）
//! - **views**: 画面ごとの Envelope API / Channel API（task details, task form, process list）
//! - **drivers**: host 側の Channel API 実装
//! - **impls**: 実装（InMemoryBus など開発用）
//! - **config**: BusConfig（timeout, polling interval, 同時呼び出しの扱い）

pub mod app;
pub mod config;
pub mod domain;
pub mod drivers;
pub mod impls;
pub mod ports;
pub mod typed;
pub mod views;

pub use self::app::{BuildError, Envelope, EnvelopeServer, ServerBuilder};
pub use self::config::{BusConfig, ConcurrentCallPolicy, ConfigError};
pub use self::domain::{
    ApiError, ApiErrorKind, Association, ContainerHandle, EnvelopeError, EnvelopeState, Origin,
    TargetOrigin,
};
