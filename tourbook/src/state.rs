//! Application state management

use std::sync::Arc;

use crate::auth::{PasswordHasher, TokenService};
use crate::config::Config;
use crate::error::Result;
use crate::mail::{LogMailer, Mailer, SmtpMailer};
use crate::payments::{gateway_from_config, PaymentGateway};
use crate::query::QueryLimits;
use crate::repository::{DocumentStore, StoreResult};
use crate::resources::{Booking, Resource, Review, Tour, User};

/// Application state shared across handlers
///
/// Everything inside is either `Clone` by design (the store handle) or
/// behind an `Arc`, so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState<S: DocumentStore> {
    store: S,
    config: Arc<Config>,
    tokens: TokenService,
    passwords: PasswordHasher,
    mailer: Arc<dyn Mailer>,
    payments: Arc<dyn PaymentGateway>,
}

impl<S: DocumentStore> std::fmt::Debug for AppState<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("service", &self.config.service.name)
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}

impl<S: DocumentStore> AppState<S> {
    /// Create a new builder around `store`
    pub fn builder(store: S) -> AppStateBuilder<S> {
        AppStateBuilder::new(store)
    }

    /// The document store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Session token service
    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Password hasher
    pub fn passwords(&self) -> &PasswordHasher {
        &self.passwords
    }

    /// Outgoing mail
    pub fn mailer(&self) -> &dyn Mailer {
        self.mailer.as_ref()
    }

    /// Checkout provider
    pub fn payments(&self) -> &dyn PaymentGateway {
        self.payments.as_ref()
    }

    /// Page-size policy for list endpoints
    pub fn query_limits(&self) -> QueryLimits {
        self.config.query.limits()
    }

    /// Whether cookies should carry the `Secure` flag
    pub fn secure_cookies(&self) -> bool {
        self.config.service.is_production()
    }
}

async fn ensure_indexes<R: Resource, S: DocumentStore>(store: &S) -> StoreResult<()> {
    for index in R::schema().unique_indexes() {
        store.ensure_unique_index(R::COLLECTION, &index).await?;
        tracing::debug!(collection = R::COLLECTION, fields = ?index, "unique index ensured");
    }
    Ok(())
}

/// Builder for AppState
pub struct AppStateBuilder<S: DocumentStore> {
    store: S,
    config: Option<Config>,
    passwords: Option<PasswordHasher>,
    mailer: Option<Arc<dyn Mailer>>,
    payments: Option<Arc<dyn PaymentGateway>>,
}

impl<S: DocumentStore> AppStateBuilder<S> {
    /// Start from a store; everything else defaults from configuration
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: None,
            passwords: None,
            mailer: None,
            payments: None,
        }
    }

    /// Set the configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a specific password hasher
    pub fn passwords(mut self, passwords: PasswordHasher) -> Self {
        self.passwords = Some(passwords);
        self
    }

    /// Use a specific mailer instead of the configured transport
    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Use a specific payment gateway instead of the configured one
    pub fn payments(mut self, payments: Arc<dyn PaymentGateway>) -> Self {
        self.payments = Some(payments);
        self
    }

    /// Build the AppState
    ///
    /// Declares every resource's unique indexes on the store.
    pub async fn build(self) -> Result<AppState<S>> {
        let config = self.config.unwrap_or_default();

        let mailer: Arc<dyn Mailer> = match self.mailer {
            Some(mailer) => mailer,
            None => match SmtpMailer::from_config(&config.email)? {
                Some(smtp) => Arc::new(smtp),
                None => Arc::new(LogMailer),
            },
        };
        let payments = match self.payments {
            Some(payments) => payments,
            None => gateway_from_config(&config.payments)?,
        };

        ensure_indexes::<Tour, S>(&self.store).await?;
        ensure_indexes::<User, S>(&self.store).await?;
        ensure_indexes::<Review, S>(&self.store).await?;
        ensure_indexes::<Booking, S>(&self.store).await?;

        Ok(AppState {
            tokens: TokenService::new(&config.jwt),
            passwords: self.passwords.unwrap_or_default(),
            store: self.store,
            config: Arc::new(config),
            mailer,
            payments,
        })
    }
}
