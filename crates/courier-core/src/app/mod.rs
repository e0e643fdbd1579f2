//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせて bus の両端を実装します。
//!
//! # 主要コンポーネント
//! - **EnvelopeServer**: host 側。guest の readiness を待って init を送り、Channel API を driver に渡す
//! - **Envelope**: guest 側。init を受けて Ready になり、Channel API を呼ぶ
//! - **ServerBuilder**: EnvelopeServer の構築とワイヤリング
//! - **MessageManager**: request / response の対応付け（両側で共通）

pub mod builder;
pub mod envelope;
mod listener;
pub mod manager;
pub mod server;
pub mod status;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ServerBuilder};
pub use self::envelope::Envelope;
pub use self::manager::{MessageManager, Route};
pub use self::server::EnvelopeServer;
pub use self::status::{EnvelopeStatus, ServerStatus};
