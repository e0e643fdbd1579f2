//! Typed - 型付き API
//!
//! このモジュールは method 名の typo を型で排除し、
//! request と実装の対応付けを静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `ApiContract`, `ApiHandler<A>`, `ApiClient<A>` - 型安全
//! - **内部（Dyn）**: `DynHandler` - object-safe, wire 上の (method, args) を扱う

pub mod client;
pub mod codec;
pub mod contract;
pub mod handler;

pub use self::client::ApiClient;
pub use self::codec::{CodecError, PayloadCodec};
pub use self::contract::{ApiContract, EnvelopeContract, InitRequest, NoOperations};
pub use self::handler::{ApiHandler, DynHandler, EnvelopeHandler, TypedHandler, erase, reply};
