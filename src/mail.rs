// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Storm notifications by mail.
//!
//! Each message opens its own SMTP session: plain connect, STARTTLS upgrade,
//! login, send.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use log::info;

use crate::config::MailConfig;
use crate::error::Result;
use crate::storm::{Notification, Notifier};

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the plain-text message for `notification`
pub fn build_message(config: &MailConfig, notification: &Notification) -> Result<Message> {
    let from: Mailbox = config.from.parse()?;
    let to: Mailbox = config.to.parse()?;

    Ok(Message::builder()
        .from(from)
        .to(to)
        .subject(notification.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(notification.body.clone())?)
}

/// Mail sent by the `storm-test-mail` command
pub fn test_notification() -> Notification {
    Notification {
        subject: "Storm warning test mail".to_string(),
        body: "This is a test mail from the rainradar-station storm warning.\n".to_string(),
    }
}

/// Sends notifications through an SMTP relay with STARTTLS and login
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    config: MailConfig,
}

impl SmtpNotifier {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let credentials =
            Credentials::new(self.config.smtp_user.clone(), self.config.smtp_pass.clone());
        Ok(SmtpTransport::starttls_relay(&self.config.smtp_server)?
            .port(self.config.smtp_port)
            .credentials(credentials)
            .timeout(Some(SMTP_TIMEOUT))
            .build())
    }
}

impl Notifier for SmtpNotifier {
    fn notify(&self, notification: &Notification) -> Result<()> {
        let message = build_message(&self.config, notification)?;
        self.transport()?.send(&message)?;
        info!("Mailed {:?} to {}", notification.subject, self.config.to);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StationError;

    fn config() -> MailConfig {
        MailConfig {
            smtp_server: "smtp.example.org".to_string(),
            smtp_port: 587,
            smtp_user: "station".to_string(),
            smtp_pass: "secret".to_string(),
            from: "Rain Station <station@example.org>".to_string(),
            to: "ops@example.org".to_string(),
        }
    }

    #[test]
    fn test_build_message_headers_and_body() {
        let notification = Notification {
            subject: "[Storm warning] Laufamholz: STORM".to_string(),
            body: "State: WATCH -> STORM\n".to_string(),
        };
        let message = build_message(&config(), &notification).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("Subject: [Storm warning] Laufamholz: STORM"));
        assert!(raw.contains("To: ops@example.org"));
        assert!(raw.contains("station@example.org"));
        assert!(raw.contains("Content-Type: text/plain"));
        assert!(raw.contains("State: WATCH -> STORM"));
    }

    #[test]
    fn test_invalid_address_is_rejected() {
        let config = MailConfig {
            to: "not an address".to_string(),
            ..config()
        };
        let result = build_message(&config, &test_notification());
        assert!(matches!(result, Err(StationError::MailAddress(_))));
    }

    #[test]
    fn test_unreachable_relay_is_an_error() {
        let config = MailConfig {
            smtp_server: "127.0.0.1".to_string(),
            smtp_port: 1,
            ..config()
        };
        let notifier = SmtpNotifier::new(config);
        assert!(matches!(
            notifier.notify(&test_notification()),
            Err(StationError::Smtp(_))
        ));
    }
}
