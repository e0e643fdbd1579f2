//! Container - guest を収める領域（iframe / div）の抽象化
//!
//! Host がマウントし、guest が listener を登録し終えたら readiness marker を立てます。
//! Host はこの marker を待ってから init を送ります（listener 登録前のメッセージは失われるため）。
//! 取り外し（Removed）は両側の dispose のきっかけになります。

use std::sync::Arc;

use tokio::sync::watch;

use super::origin::Origin;

/// Lifecycle of a container as seen from both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    /// Attached to the host page; the guest has not signalled readiness.
    Mounted,
    /// The guest is listening for messages.
    Ready,
    /// Detached from the page. Terminal.
    Removed,
}

#[derive(Debug)]
struct ContainerInner {
    name: String,
    origin: Origin,
    status: watch::Sender<ContainerStatus>,
}

/// Shared handle on one mounted container.
///
/// Cloning is cheap; all clones observe the same status.
#[derive(Debug, Clone)]
pub struct ContainerHandle {
    inner: Arc<ContainerInner>,
}

impl ContainerHandle {
    /// Mount a container whose content is served from `origin`.
    pub fn mount(name: impl Into<String>, origin: Origin) -> Self {
        let (status, _) = watch::channel(ContainerStatus::Mounted);
        Self {
            inner: Arc::new(ContainerInner {
                name: name.into(),
                origin,
                status,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Origin of the guest content; messages for the guest are posted there.
    pub fn origin(&self) -> &Origin {
        &self.inner.origin
    }

    pub fn status(&self) -> ContainerStatus {
        *self.inner.status.borrow()
    }

    pub fn is_ready(&self) -> bool {
        self.status() == ContainerStatus::Ready
    }

    pub fn is_removed(&self) -> bool {
        self.status() == ContainerStatus::Removed
    }

    /// Set the readiness marker. Returns false if the container was already removed.
    pub fn mark_ready(&self) -> bool {
        let mut marked = false;
        self.inner.status.send_if_modified(|status| match status {
            ContainerStatus::Mounted => {
                *status = ContainerStatus::Ready;
                marked = true;
                true
            }
            ContainerStatus::Ready => {
                marked = true;
                false
            }
            ContainerStatus::Removed => false,
        });
        marked
    }

    /// Detach the container. Both sides dispose when they observe this.
    pub fn remove(&self) {
        self.inner.status.send_if_modified(|status| {
            if *status == ContainerStatus::Removed {
                return false;
            }
            *status = ContainerStatus::Removed;
            true
        });
    }

    pub fn watch(&self) -> watch::Receiver<ContainerStatus> {
        self.inner.status.subscribe()
    }
}

/// Resolves once the watched container is removed (or every handle is gone).
pub(crate) async fn container_removed(rx: &mut watch::Receiver<ContainerStatus>) {
    let _ = rx.wait_for(|status| *status == ContainerStatus::Removed).await;
}
