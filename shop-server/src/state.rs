//! Application state for shop-server

use aws_sdk_sesv2::Client as SesClient;
use std::sync::Arc;

use crate::auth::{JwtConfig, JwtService};
use crate::config::{Config, EmailBackend};
use crate::db::{MemoryStorage, PgStorage, Storage};
use crate::notify::{LiveHub, LogMailer, Mailer, SesMailer};
use crate::orders::{NotificationWorker, OUTBOX_CAPACITY, OrderEngine, Outbox};
use crate::payment::{PaymentGateway, PaymentService, RazorpayGateway};
use crate::services::{CartService, CatalogService, ReviewService};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Repository backend (PostgreSQL or in-memory)
    pub storage: Arc<dyn Storage>,
    /// Bearer token validation
    pub jwt: Arc<JwtService>,
    pub catalog: CatalogService,
    pub carts: CartService,
    pub reviews: ReviewService,
    pub orders: Arc<OrderEngine>,
    pub payments: Arc<PaymentService>,
    /// Realtime topic hub (WebSocket subscribers)
    pub live: LiveHub,
}

impl AppState {
    /// Wire services over the given backends.
    ///
    /// The returned worker owns the outbox receiver and must be spawned.
    pub fn assemble(
        config: &Config,
        storage: Arc<dyn Storage>,
        mailer: Arc<dyn Mailer>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> (Self, NotificationWorker) {
        let live = LiveHub::new();
        let (outbox, rx) = Outbox::channel(OUTBOX_CAPACITY);
        let worker = NotificationWorker::new(rx, mailer, live.clone());

        let orders = Arc::new(OrderEngine::new(
            storage.clone(),
            outbox,
            config.status_transitions,
        ));
        let payments = Arc::new(PaymentService::new(
            gateway,
            config.razorpay_key_secret.clone(),
            config.payment_currency.clone(),
            orders.clone(),
            storage.clone(),
        ));

        let state = Self {
            jwt: Arc::new(JwtService::new(JwtConfig::from(config))),
            catalog: CatalogService::new(storage.clone()),
            carts: CartService::new(storage.clone()),
            reviews: ReviewService::new(storage.clone()),
            storage,
            orders,
            payments,
            live,
        };
        (state, worker)
    }

    /// Create a new AppState from configuration
    pub async fn new(config: &Config) -> Result<(Self, NotificationWorker), BoxError> {
        let storage: Arc<dyn Storage> = match &config.database_url {
            Some(url) => {
                let pg = PgStorage::connect(url).await?;
                tracing::info!("Storage: PostgreSQL (migrations applied)");
                Arc::new(pg)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory storage");
                Arc::new(MemoryStorage::new())
            }
        };

        let mailer: Arc<dyn Mailer> = match config.email_backend {
            EmailBackend::Ses => {
                let aws_config =
                    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
                let ses = if let Ok(ses_region) = std::env::var("SES_REGION") {
                    let ses_config = aws_config
                        .to_builder()
                        .region(aws_config::Region::new(ses_region))
                        .build();
                    SesClient::new(&ses_config)
                } else {
                    SesClient::new(&aws_config)
                };
                Arc::new(SesMailer::new(ses, config.ses_from_email.clone()))
            }
            EmailBackend::Log => Arc::new(LogMailer),
        };

        let gateway: Arc<dyn PaymentGateway> = Arc::new(RazorpayGateway::new(
            config.razorpay_key_id.clone(),
            config.razorpay_key_secret.clone(),
        ));

        Ok(Self::assemble(config, storage, mailer, gateway))
    }
}
