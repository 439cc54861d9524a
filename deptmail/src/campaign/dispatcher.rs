//! Sequential, paced campaign dispatch.
//!
//! Recipients are processed strictly one at a time. Each send runs under an
//! explicit timeout, and a fixed pause separates consecutive attempts to stay
//! under the provider's rate limits. A failed send is logged and counted; it
//! never stops the run.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{error, info};

use super::report::{CampaignReport, SendOutcome};
use super::Campaign;
use crate::config::SmtpSettings;
use crate::mail::{Mailer, OutgoingEmail, SendError};
use crate::recipients::RecipientRecord;
use crate::template::{embed_pixel, render};

/// Drives one campaign through a [`Mailer`].
pub struct Dispatcher<M> {
    mailer: M,
    pacing_delay: Duration,
    send_timeout: Duration,
}

impl<M: Mailer> Dispatcher<M> {
    /// Create a dispatcher with the default pacing and timeout.
    pub fn new(mailer: M) -> Self {
        let defaults = SmtpSettings::default();
        Self {
            mailer,
            pacing_delay: defaults.pacing_delay,
            send_timeout: defaults.send_timeout,
        }
    }

    /// Create a dispatcher using the pacing and timeout from `settings`.
    pub fn with_settings(mailer: M, settings: &SmtpSettings) -> Self {
        Self {
            mailer,
            pacing_delay: settings.pacing_delay,
            send_timeout: settings.send_timeout,
        }
    }

    pub fn pacing_delay(mut self, delay: Duration) -> Self {
        self.pacing_delay = delay;
        self
    }

    pub fn send_timeout(mut self, limit: Duration) -> Self {
        self.send_timeout = limit;
        self
    }

    /// Send `template` to every recipient, in order.
    ///
    /// The tracking pixel (if any) is embedded into the template once, before
    /// personalization.
    pub async fn run(
        &self,
        campaign: &Campaign,
        template: &str,
        recipients: &[RecipientRecord],
    ) -> CampaignReport {
        let template = match &campaign.tracking_pixel_url {
            Some(url) => embed_pixel(template, url),
            None => template.to_string(),
        };

        info!(
            filter = %campaign.filter,
            recipients = recipients.len(),
            pacing_delay_ms = self.pacing_delay.as_millis() as u64,
            send_timeout_ms = self.send_timeout.as_millis() as u64,
            tracking = campaign.tracking_pixel_url.is_some(),
            "campaign_start"
        );

        let mut report = CampaignReport::new(campaign.filter.clone());

        for (idx, recipient) in recipients.iter().enumerate() {
            if idx > 0 && !self.pacing_delay.is_zero() {
                sleep(self.pacing_delay).await;
            }

            let email = OutgoingEmail {
                from: campaign.sender.address().to_string(),
                to: recipient.email.clone(),
                subject: campaign.subject.clone(),
                html: render(&template, recipient),
            };

            let result = self.send_one(&email).await;

            match &result {
                Ok(()) => info!(
                    to = %recipient.email,
                    group_code = %recipient.group_code,
                    position = idx + 1,
                    "campaign_send_ok"
                ),
                Err(e) => error!(
                    to = %recipient.email,
                    group_code = %recipient.group_code,
                    position = idx + 1,
                    error = %e,
                    "campaign_send_failed"
                ),
            }

            report.record(SendOutcome::new(recipient.clone(), &result));
        }

        info!(
            attempted = report.attempted(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "campaign_complete"
        );

        report
    }

    async fn send_one(&self, email: &OutgoingEmail) -> Result<(), SendError> {
        match timeout(self.send_timeout, self.mailer.send(email)).await {
            Ok(result) => result,
            Err(_) => Err(SendError::Timeout(self.send_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::{BodySource, SenderIdentity};
    use crate::mail::MockMailer;
    use crate::recipients::GroupFilter;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use tokio::time::Instant;
    use url::Url;

    const TEMPLATE: &str = "<html><body><h1>Hello, {name}</h1><p>{department_code}</p></body></html>";

    fn campaign(filter: GroupFilter) -> Campaign {
        Campaign {
            subject: "Update".to_string(),
            body: BodySource::Literal(TEMPLATE.to_string()),
            filter,
            sender: SenderIdentity::new("campaigns@example.com", "secret"),
            tracking_pixel_url: None,
        }
    }

    fn recipients() -> Vec<RecipientRecord> {
        vec![
            RecipientRecord::new("a@x.com", "Alice", "HR"),
            RecipientRecord::new("b@x.com", "Bob", "IT"),
        ]
    }

    /// Records every email it is asked to send.
    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<OutgoingEmail>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &OutgoingEmail) -> Result<(), SendError> {
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    /// Never completes on its first call; succeeds afterwards.
    #[derive(Default)]
    struct StallOnceMailer {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl Mailer for StallOnceMailer {
        async fn send(&self, _email: &OutgoingEmail) -> Result<(), SendError> {
            let first = {
                let mut calls = self.calls.lock().unwrap();
                *calls += 1;
                *calls == 1
            };
            if first {
                std::future::pending::<()>().await;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_all_sends_succeed_report_per_group() {
        let mut mailer = MockMailer::new();
        mailer.expect_send().times(2).returning(|_| Ok(()));

        let dispatcher = Dispatcher::new(mailer).pacing_delay(Duration::ZERO);
        let report = dispatcher
            .run(&campaign(GroupFilter::All), TEMPLATE, &recipients())
            .await;

        let expected: BTreeMap<String, usize> =
            [("HR".to_string(), 1), ("IT".to_string(), 1)].into_iter().collect();
        assert_eq!(report.sent_by_group(), expected);
        assert_eq!(report.failed(), 0);
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_the_run() {
        let mut mailer = MockMailer::new();
        mailer
            .expect_send()
            .withf(|email| email.to == "a@x.com")
            .times(1)
            .returning(|_| Err(SendError::Transport("421 try again later".to_string())));
        mailer
            .expect_send()
            .withf(|email| email.to == "b@x.com")
            .times(1)
            .returning(|_| Ok(()));

        let dispatcher = Dispatcher::new(mailer).pacing_delay(Duration::ZERO);
        let report = dispatcher
            .run(&campaign(GroupFilter::All), TEMPLATE, &recipients())
            .await;

        assert_eq!((report.attempted(), report.succeeded(), report.failed()), (2, 1, 1));
        let expected: BTreeMap<String, usize> = [("IT".to_string(), 1)].into_iter().collect();
        assert_eq!(report.sent_by_group(), expected);
        assert_eq!(
            report.outcomes()[0].error.as_deref(),
            Some("smtp transport error: 421 try again later")
        );
    }

    #[tokio::test]
    async fn test_messages_are_personalized() {
        let dispatcher = Dispatcher::new(RecordingMailer::default()).pacing_delay(Duration::ZERO);
        dispatcher
            .run(&campaign(GroupFilter::All), TEMPLATE, &recipients())
            .await;

        let sent = dispatcher.mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].from, "campaigns@example.com");
        assert_eq!(sent[0].to, "a@x.com");
        assert_eq!(sent[0].subject, "Update");
        assert_eq!(sent[0].html, "<html><body><h1>Hello, Alice</h1><p>HR</p></body></html>");
        assert_eq!(sent[1].html, "<html><body><h1>Hello, Bob</h1><p>IT</p></body></html>");
    }

    #[tokio::test]
    async fn test_tracking_pixel_embedded_in_every_message() {
        let mut tracked = campaign(GroupFilter::All);
        tracked.tracking_pixel_url = Some(Url::parse("https://t.example.com/open.png").unwrap());

        let dispatcher = Dispatcher::new(RecordingMailer::default()).pacing_delay(Duration::ZERO);
        dispatcher.run(&tracked, TEMPLATE, &recipients()).await;

        let sent = dispatcher.mailer.sent.lock().unwrap();
        assert!(sent
            .iter()
            .all(|m| m.html.contains(r#"<img src="https://t.example.com/open.png""#)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pacing_between_consecutive_sends() {
        let three = vec![
            RecipientRecord::new("a@x.com", "Alice", "HR"),
            RecipientRecord::new("b@x.com", "Bob", "IT"),
            RecipientRecord::new("c@x.com", "Cy", "IT"),
        ];

        let dispatcher = Dispatcher::new(RecordingMailer::default())
            .pacing_delay(Duration::from_secs(5));

        let started = Instant::now();
        let report = dispatcher.run(&campaign(GroupFilter::All), TEMPLATE, &three).await;
        let elapsed = started.elapsed();

        assert_eq!(report.succeeded(), 3);
        assert!(elapsed >= Duration::from_secs(10), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(15), "elapsed {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_send_times_out_and_run_continues() {
        let dispatcher = Dispatcher::new(StallOnceMailer::default())
            .pacing_delay(Duration::ZERO)
            .send_timeout(Duration::from_secs(30));

        let report = dispatcher
            .run(&campaign(GroupFilter::All), TEMPLATE, &recipients())
            .await;

        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.outcomes()[0].error.as_deref(), Some("send timed out after 30000ms"));
        assert!(report.outcomes()[1].success);
    }
}
