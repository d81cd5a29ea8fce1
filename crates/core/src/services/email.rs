//! Email notification service.

use apollusia_common::{config::MailConfig, AppError, AppResult};
use apollusia_db::entities::{participant, poll, poll_event};
use chrono_tz::Tz;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use super::render::{render_date, Answer};

/// Email message to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient display name
    pub to_name: String,
    /// Recipient email address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain text body
    pub text_body: String,
    /// HTML body
    pub html_body: String,
}

/// Mail templates and the data they render.
#[derive(Debug, Clone, Copy)]
pub enum MailTemplate<'a> {
    /// Confirmation to a participant who left a mail address.
    Participated {
        poll: &'a poll::Model,
        participant: &'a participant::Model,
    },
    /// Admin summary of a new participation.
    Participant {
        poll: &'a poll::Model,
        participant: &'a participant::Model,
        events: &'a [poll_event::Model],
    },
    /// Booking result for one participant.
    Book {
        poll: &'a poll::Model,
        participant: &'a participant::Model,
        appointments: &'a [String],
    },
}

impl MailTemplate<'_> {
    /// Template name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Participated { .. } => "participated",
            Self::Participant { .. } => "participant",
            Self::Book { .. } => "book",
        }
    }

    /// Subject line.
    #[must_use]
    pub const fn subject(&self) -> &'static str {
        match self {
            Self::Participated { .. } => "Participated in Poll",
            Self::Participant { .. } => "Updates in Poll",
            Self::Book { .. } => "Poll booked",
        }
    }

    /// Render into a message for `to_name <to>`.
    #[must_use]
    pub fn render(&self, to_name: &str, to: &str, origin: &str, tz: Tz) -> EmailMessage {
        let (text, html) = match *self {
            Self::Participated { poll, participant } => {
                let link = format!("{origin}/poll/{}/participate", poll.id);
                let text = format!(
                    "Hello {},\n\nyou participated in the poll \"{}\".\nYou can review your answers at {link}\n",
                    participant.name, poll.title
                );
                let html = format!(
                    "<p>Hello {},</p><p>you participated in the poll <strong>{}</strong>.</p>\
                     <p><a href=\"{link}\">Review your answers</a></p>",
                    escape_html(&participant.name),
                    escape_html(&poll.title)
                );
                (text, html)
            }
            Self::Participant {
                poll,
                participant,
                events,
            } => {
                let link = format!("{origin}/poll/{}/participate", poll.id);
                let mut text = format!(
                    "{} participated in your poll \"{}\".\n\n",
                    participant.name, poll.title
                );
                let mut rows = String::new();
                for event in events {
                    let answer = Answer::of(participant, &event.id);
                    let start = render_date(&event.start, tz);
                    let end = render_date(&event.end, tz);
                    text.push_str(&format!("[{}] {start} - {end}\n", answer.icon()));
                    rows.push_str(&format!(
                        "<tr><td>{start} - {end}</td><td class=\"{}\">{}</td></tr>",
                        answer.css_class(),
                        answer.icon()
                    ));
                }
                text.push_str(&format!("\nSee all answers at {link}\n"));
                let html = format!(
                    "<p><strong>{}</strong> participated in your poll <strong>{}</strong>.</p>\
                     <table>{rows}</table><p><a href=\"{link}\">See all answers</a></p>",
                    escape_html(&participant.name),
                    escape_html(&poll.title)
                );
                (text, html)
            }
            Self::Book {
                poll,
                participant,
                appointments,
            } => {
                let link = format!("{origin}/poll/{}/participate", poll.id);
                let mut text = format!(
                    "Hello {},\n\nthe poll \"{}\" has been booked:\n\n",
                    participant.name, poll.title
                );
                let mut items = String::new();
                for line in appointments {
                    text.push_str(&format!("- {line}\n"));
                    items.push_str(&format!("<li>{}</li>", escape_html(line)));
                }
                text.push_str(&format!(
                    "\nEvents marked with * are ones you selected.\n{link}\n"
                ));
                let html = format!(
                    "<p>Hello {},</p><p>the poll <strong>{}</strong> has been booked:</p>\
                     <ul>{items}</ul><p>Events marked with * are ones you selected.</p>\
                     <p><a href=\"{link}\">Open the poll</a></p>",
                    escape_html(&participant.name),
                    escape_html(&poll.title)
                );
                (text, html)
            }
        };

        EmailMessage {
            to_name: to_name.to_string(),
            to: to.to_string(),
            subject: self.subject().to_string(),
            text_body: text,
            html_body: wrap_html(&html, origin),
        }
    }
}

fn wrap_html(content: &str, origin: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; line-height: 1.6; color: #333; max-width: 600px; margin: 0 auto; padding: 20px; }}
        a {{ color: #007bff; }}
        td {{ padding: 4px 8px; }}
        .p-yes {{ color: #198754; }}
        .p-maybe {{ color: #fd7e14; }}
        .p-no {{ color: #dc3545; }}
    </style>
</head>
<body>
    {content}
    <hr style="margin-top: 40px; border: none; border-top: 1px solid #e9ecef;">
    <p style="font-size: 12px; color: #6c757d;">
        This email was sent by <a href="{origin}">Apollusia</a>.
    </p>
</body>
</html>"#
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Email service.
#[derive(Clone)]
pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    /// Build the SMTP transport from configuration.
    pub fn new(config: &MailConfig) -> AppResult<Self> {
        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        }
        .map_err(|e| AppError::Config(format!("Invalid SMTP relay: {e}")))?;

        let mut builder = builder.port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| AppError::Config(format!("Invalid sender address: {e}")))?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }

    /// Send an email.
    pub async fn send(&self, message: EmailMessage) -> AppResult<()> {
        let to = Mailbox::new(
            Some(message.to_name.clone()),
            message
                .to
                .parse()
                .map_err(|e| AppError::BadRequest(format!("Invalid recipient address: {e}")))?,
        );

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.text_body,
                message.html_body,
            ))
            .map_err(|e| AppError::Internal(format!("Failed to build email: {e}")))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| AppError::ExternalService(format!("SMTP delivery failed: {e}")))?;

        tracing::debug!(to = %message.to, subject = %message.subject, "Email sent");
        Ok(())
    }
}
