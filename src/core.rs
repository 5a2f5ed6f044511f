use crate::{
    admin::{AdminSite, ModelAdmin},
    config::Config,
    middleware::MakeRequestUuid,
};
use axum::{Router, extract::DefaultBodyLimit};
use std::sync::Arc;
use tokio::signal;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

type RouterFn = Box<dyn FnOnce(Router) -> Router + Send>;

/// Serves an [`AdminSite`] over HTTP.
///
/// Authentication belongs to the host: add a layer that inserts a
/// [`Principal`](crate::admin::Principal) into the request extensions.
///
/// # Example
///
/// ```rust,ignore
/// let config = ConfigBuilder::new().from_env().build()?;
/// let server = AdminServer::new(config);
/// totp::register(server.site(), TotpDeviceAdmin::new(store)?);
///
/// server
///     .layer(axum::middleware::from_fn(authenticate))
///     .serve()
///     .await?;
/// ```
pub struct AdminServer {
    config: Config,
    site: Arc<AdminSite>,
    extra_routers: Vec<Router>,
    layers: Vec<RouterFn>,
}

impl AdminServer {
    pub fn new(config: Config) -> Self {
        let site = Arc::new(AdminSite::new(config.admin.clone()));
        Self {
            config,
            site,
            extra_routers: Vec::new(),
            layers: Vec::new(),
        }
    }

    pub fn site(&self) -> &Arc<AdminSite> {
        &self.site
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register a model admin on the site, skipping duplicates.
    pub fn with_model_admin(self, admin: Arc<dyn ModelAdmin>) -> Self {
        self.site.register_once(admin);
        self
    }

    /// Merge a router served next to the admin, e.g. a login page.
    pub fn merge_router(mut self, router: Router) -> Self {
        self.extra_routers.push(router);
        self
    }

    /// Apply a layer to the admin routes and merged routers.
    ///
    /// Layers run inside the request id and tracing layers.
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: tower::Layer<axum::routing::Route> + Clone + Send + Sync + 'static,
        L::Service: tower::Service<axum::http::Request<axum::body::Body>, Error = std::convert::Infallible>
            + Clone
            + Send
            + Sync
            + 'static,
        <L::Service as tower::Service<axum::http::Request<axum::body::Body>>>::Response:
            axum::response::IntoResponse + 'static,
        <L::Service as tower::Service<axum::http::Request<axum::body::Body>>>::Future: Send + 'static,
    {
        self.layers.push(Box::new(move |router: Router| router.layer(layer)));
        self
    }

    /// The complete router with middleware applied.
    pub fn into_router(self) -> Router {
        let mut router = self.site.router();

        for extra in self.extra_routers {
            router = router.merge(extra);
        }

        for apply in self.layers {
            router = apply(router);
        }

        // Outermost last. The id must be set before propagation sees the
        // request, so SetRequestIdLayer wraps PropagateRequestIdLayer.
        router
            .layer(DefaultBodyLimit::max(self.config.server.max_body_size))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Bind the configured address and serve until Ctrl-C or SIGTERM.
    pub async fn serve(self) -> Result<(), std::io::Error> {
        let addr = self
            .config
            .server
            .addr()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let prefix = self.site.index_path();

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!(
            hide_sensitive_data = self.site.hide_sensitive_data(),
            models = self.site.registered().len(),
            "Admin listening on http://{}{}",
            addr,
            prefix
        );

        axum::serve(listener, self.into_router())
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
