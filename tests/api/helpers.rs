use std::{
    io,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use contact_relay::{
    configuration::{get_configuration, Settings},
    domain::OutgoingMessage,
    email_client::{DeliveryError, MailTransport},
    startup::Application,
    telemetry::{get_subscriber, init_subscriber},
};
use once_cell::sync::Lazy;
use tokio::sync::mpsc;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

pub const EXPECTED_HOST: &str = "example.com";
pub const EXPECTED_REFERER: &str = "https://example.com/contact";
pub const RECIPIENT: &str = "owner@example.com";

static TRACING: Lazy<()> = Lazy::new(|| {
    let outcome = if std::env::var("TEST_LOG").is_ok() {
        init_subscriber(get_subscriber("test", "debug", std::io::stdout))
    } else {
        init_subscriber(get_subscriber("test", "debug", std::io::sink))
    };
    outcome.expect("Failed to install the tracing subscriber");
});

/// Bunyan records written while a `capture_logs` guard is alive on the current thread.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl LogBuffer {
    pub fn records(&self, msg: &str) -> Vec<serde_json::Value> {
        let logs = self.0.lock().unwrap();
        String::from_utf8_lossy(&logs)
            .lines()
            .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
            .filter(|record| record["msg"] == msg)
            .collect()
    }
}

/// Route the logs of the current thread into a buffer.
///
/// `#[tokio::test]` runs the server and the test on the same thread, so request
/// handling is captured too.
pub fn capture_logs() -> (LogBuffer, DefaultGuard) {
    let logs = LogBuffer::default();
    let guard = tracing::subscriber::set_default(get_subscriber("test", "info", logs.clone()));
    (logs, guard)
}

/// Captures messages instead of talking to an SMTP server.
struct RecordingTransport(mpsc::UnboundedSender<OutgoingMessage>);

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, message: OutgoingMessage) -> Result<(), DeliveryError> {
        let _ = self.0.send(message);
        Ok(())
    }
}

pub struct TestApp {
    pub address: String,
    pub endpoint: String,
    outbox: mpsc::UnboundedReceiver<OutgoingMessage>,
}

impl TestApp {
    pub fn contact_url(&self) -> String {
        format!("{}/{}/", self.address, self.endpoint)
    }

    /// A request that passes every access rule.
    pub fn contact_request(&self) -> reqwest::RequestBuilder {
        self.request(&self.contact_url(), EXPECTED_HOST, Some(EXPECTED_REFERER))
    }

    pub fn request(&self, url: &str, host: &str, referer: Option<&str>) -> reqwest::RequestBuilder {
        let request = reqwest::Client::new()
            .post(url)
            .header(reqwest::header::HOST, host);

        match referer {
            Some(referer) => request.header(reqwest::header::REFERER, referer),
            None => request,
        }
    }

    pub async fn post_contact(&self, body: serde_json::Value) -> reqwest::Response {
        self.contact_request()
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Wait for the next message handed to the mail transport.
    pub async fn next_email(&mut self) -> OutgoingMessage {
        tokio::time::timeout(Duration::from_secs(2), self.outbox.recv())
            .await
            .expect("No email was dispatched in time")
            .expect("The mail transport was dropped")
    }

    pub async fn assert_no_email(&mut self) {
        let outcome = tokio::time::timeout(Duration::from_millis(200), self.outbox.recv()).await;
        assert!(outcome.is_err(), "An email was dispatched unexpectedly");
    }
}

pub fn valid_body() -> serde_json::Value {
    serde_json::json!({
        "name": "Jane",
        "phone": "555-1234",
        "message": "Hi",
    })
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

pub async fn spawn_app_with(customize: impl FnOnce(&mut Settings)) -> TestApp {
    Lazy::force(&TRACING);

    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration");
        c.application.port = 0;
        c.application.root_path = None;
        c.contact.endpoint = Some("abc123".into());
        c.contact.expected_host = EXPECTED_HOST.into();
        c.contact.expected_referer = EXPECTED_REFERER.into();
        c.contact.check_referer = true;
        c.contact.enforce_field_lengths = true;
        c.contact.recipient = RECIPIENT.parse().expect("Invalid recipient");
        customize(&mut c);
        c
    };

    let (sender, outbox) = mpsc::unbounded_channel();
    let application =
        Application::build_with_transport(configuration, RecordingTransport(sender))
            .expect("Failed to build application");
    let address = format!(
        "http://{}",
        application.address().expect("Failed to read the bound address")
    );
    let endpoint = application.endpoint().to_string();

    let _ = tokio::spawn(async move { application.run().await.expect("Failed to run the server") });

    TestApp {
        address,
        endpoint,
        outbox,
    }
}
