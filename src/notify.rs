use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::HttpSettings;
use crate::sources::USER_AGENT;

/// An HTML email summarizing new rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub subject: String,
    pub html_body: String,
    pub from: String,
    pub to: Vec<String>,
}

/// Delivery is best-effort: implementations report success and never return errors.
pub trait Notifier {
    fn send(&self, notification: &Notification) -> bool;
}

/// Posts to the SendGrid v3 `mail/send` endpoint, which answers 202 on acceptance.
pub struct SendgridNotifier {
    url: String,
    api_key: String,
    connect_timeout_ms: u64,
    receive_timeout_ms: u64,
}

impl SendgridNotifier {
    pub fn new(url: String, api_key: String, http: &HttpSettings) -> SendgridNotifier {
        SendgridNotifier {
            url,
            api_key,
            connect_timeout_ms: http.connect_timeout_ms,
            receive_timeout_ms: http.receive_timeout_ms,
        }
    }

    fn payload(notification: &Notification) -> Value {
        let to: Vec<Value> = notification.to.iter().map(|address| json!({ "email": address })).collect();
        json!({
            "personalizations": [{ "to": to }],
            "from": { "email": notification.from },
            "subject": notification.subject,
            "content": [{ "type": "text/html", "value": notification.html_body }],
        })
    }
}

impl Notifier for SendgridNotifier {
    fn send(&self, notification: &Notification) -> bool {
        if notification.to.is_empty() {
            warn!(subject = notification.subject.as_str(), "no recipients configured, not sending");
            return false;
        }

        let response = ureq::post(&self.url)
            .set("User-Agent", USER_AGENT)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .timeout_connect(self.connect_timeout_ms)
            .timeout_read(self.receive_timeout_ms)
            .send_json(SendgridNotifier::payload(notification));

        if let Some(error) = response.synthetic_error() {
            warn!(error = %error, "error while sending email");
            return false;
        }
        let status = response.status();
        debug!(status, "email response");
        if status != 202 {
            warn!(status, "bad status code while sending email");
            return false;
        }
        info!(subject = notification.subject.as_str(), recipients = notification.to.len(), "email sent");
        true
    }
}

/// Sends and logs; a failed delivery never reaches the caller as an error.
pub fn dispatch(notifier: &dyn Notifier, notification: &Notification) -> bool {
    let sent = notifier.send(notification);
    if !sent {
        warn!(subject = notification.subject.as_str(), "notification was not delivered");
    }
    sent
}

/// Renders `rows` as an HTML table limited to `columns`, in that order.
pub fn html_table(columns: &[&str], rows: &[Value]) -> String {
    let mut html = String::from("<table border=\"1\" class=\"dataframe\">\n<thead>\n<tr>");
    for column in columns {
        html.push_str(&format!("<th>{}</th>", escape(column)));
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");

    for row in rows {
        html.push_str("<tr>");
        for column in columns {
            html.push_str(&format!("<td>{}</td>", escape(&cell(row.get(*column)))));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>");
    html
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.to_owned(),
        Some(other) => other.to_string(),
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
