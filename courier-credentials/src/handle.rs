//! The shared backend-client handle read by every session

use std::sync::Arc;

use tokio::sync::watch;

use crate::Credential;

/// Builds a backend client bound to one credential
pub trait ClientFactory: Send + Sync + 'static {
    type Client: Send + Sync + 'static;

    fn build(&self, credential: &Credential) -> Self::Client;
}

/// Cheaply cloneable reference to the current backend client.
///
/// The client is swapped as a whole on every renewal, so a reader always
/// sees a client built entirely from either the old or the new credential.
#[derive(Debug)]
pub struct ClientHandle<C> {
    current: watch::Receiver<Arc<C>>,
}

impl<C> Clone for ClientHandle<C> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
        }
    }
}

impl<C> ClientHandle<C> {
    pub(crate) const fn new(current: watch::Receiver<Arc<C>>) -> Self {
        Self { current }
    }

    /// A handle that never changes, for tests and static credentials
    pub fn fixed(client: C) -> Self {
        let (_, current) = watch::channel(Arc::new(client));
        Self { current }
    }

    /// The client built from the most recent credential
    pub fn current(&self) -> Arc<C> {
        Arc::clone(&self.current.borrow())
    }
}

/// Rebuild the client every time the credential changes
pub(crate) async fn follow<F: ClientFactory>(
    factory: F,
    mut credentials: watch::Receiver<Credential>,
    clients: watch::Sender<Arc<F::Client>>,
) {
    while credentials.changed().await.is_ok() {
        let credential = credentials.borrow_and_update().clone();
        clients.send_replace(Arc::new(factory.build(&credential)));
    }
}
