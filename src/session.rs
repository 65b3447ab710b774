// Authenticated drive handle. The handle can be swapped at any time; the
// path state lives elsewhere and is untouched by a swap.

use tracing::{error, info};

use crate::api::Connector;

pub struct Session<C> {
    client: Option<C>,
}

impl<C> Default for Session<C> {
    fn default() -> Self {
        Session { client: None }
    }
}

impl<C> Session<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn client(&self) -> Option<&C> {
        self.client.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.client.is_some()
    }

    /// Authenticate with `token` and install the resulting handle. On
    /// failure the current handle (if any) is kept and `false` is returned.
    pub fn authenticate<K>(&mut self, connector: &K, token: &str) -> bool
    where
        K: Connector<Client = C>,
    {
        info!("attempting login to drive");
        match connector.connect(token) {
            Ok(client) => {
                self.client = Some(client);
                info!("login successful");
                true
            }
            Err(e) => {
                error!(error = %e, "login failed");
                false
            }
        }
    }
}
