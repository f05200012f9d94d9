use crate::{
    client_addr::ProxyPolicy,
    configuration::Settings,
    email_client::{MailDispatcher, MailTransport, SmtpMailer},
    request_id::{AddRequestIdLayer, MakeSpanWithRequestId, UseRequestId},
    routes,
};

use std::{
    net::{SocketAddr, TcpListener},
    sync::Arc,
};

use anyhow::Context;
use axum::{routing, AddExtensionLayer, Router};
use tower::ServiceBuilder;
use tower_http::{trace::TraceLayer, ServiceBuilderExt};

pub struct Application {
    app: Router,
    listener: TcpListener,
    endpoint: String,
    public_path: String,
}

impl Application {
    /// Build the application with SMTP delivery configured from `settings`.
    pub fn build(settings: Settings) -> anyhow::Result<Self> {
        let mailer =
            SmtpMailer::new(&settings.email_client).context("invalid SMTP configuration")?;
        Self::build_with_transport(settings, mailer)
    }

    pub fn build_with_transport(
        settings: Settings,
        transport: impl MailTransport + 'static,
    ) -> anyhow::Result<Self> {
        let endpoint = settings.contact.resolve_endpoint();
        // The proxy in front strips the root path, but direct hits on the
        // prefixed form are served as well.
        let prefix = settings.application.route_prefix();
        let public_path = format!("{}/{}/", prefix.as_deref().unwrap_or_default(), endpoint);
        let bases: Vec<String> = std::iter::once(String::new()).chain(prefix).collect();

        let proxy_policy = ProxyPolicy {
            enabled: settings.application.proxy_headers,
            trusted: settings.application.forwarded_allow_ips.clone(),
        };
        let contact_settings = Arc::new(settings.contact);
        let dispatcher = MailDispatcher::new(transport);

        let middleware = ServiceBuilder::new()
            .layer(AddRequestIdLayer)
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(MakeSpanWithRequestId)
                    .on_failure(()),
            )
            .set_x_request_id(UseRequestId)
            .propagate_x_request_id()
            .layer(AddExtensionLayer::new(proxy_policy))
            .layer(AddExtensionLayer::new(contact_settings))
            .layer(AddExtensionLayer::new(dispatcher))
            .into_inner();

        let app = bases
            .iter()
            .fold(Router::new(), |router, base| {
                router
                    .route(
                        &format!("{}/{}/", base, endpoint),
                        routing::post(routes::contact::handler),
                    )
                    .route(
                        &format!("{}/{}", base, endpoint),
                        routing::any(routes::contact::redirect_with_slash),
                    )
            })
            .layer(middleware);

        let address = settings.application.address();
        let listener = TcpListener::bind(&address)
            .with_context(|| format!("failed to bind {}", address))?;

        Ok(Application {
            app,
            listener,
            endpoint,
            public_path,
        })
    }

    pub async fn run(self) -> Result<(), hyper::Error> {
        hyper::Server::from_tcp(self.listener)?
            .serve(
                self.app
                    .into_make_service_with_connect_info::<SocketAddr, _>(),
            )
            .await
    }

    pub fn address(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The path segment the contact endpoint is served under.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The path clients reach the endpoint at, root path included.
    pub fn public_path(&self) -> &str {
        &self.public_path
    }
}
