//! Navigator port - host 側のページ遷移

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("cannot navigate to '{0}'")]
    Rejected(String),
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, location: &str) -> Result<(), NavigationError>;
}
