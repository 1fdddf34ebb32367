//! Alert fan-out to the subscribers of one city.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::channel::MessagingChannel;
use crate::config::ScanSettings;
use crate::directory::SubscriberDirectory;
use crate::error::SendError;
use crate::phone::{chat_address, PhoneNormalizer};

pub struct NotificationDispatcher {
    directory: Arc<dyn SubscriberDirectory>,
    channel: Arc<dyn MessagingChannel>,
    normalizer: Arc<dyn PhoneNormalizer>,
    settings: ScanSettings,
}

impl NotificationDispatcher {
    pub fn new(
        directory: Arc<dyn SubscriberDirectory>,
        channel: Arc<dyn MessagingChannel>,
        normalizer: Arc<dyn PhoneNormalizer>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            directory,
            channel,
            normalizer,
            settings,
        }
    }

    /// Message every subscriber of `location`, returning how many sends succeeded.
    ///
    /// Recipients are served strictly one after another with `message_delay`
    /// after each attempt, successful or not. A failed subscriber query or a
    /// failed send never propagates.
    pub async fn dispatch_alert(&self, location: &str, pm25: f64, aqi: u32) -> usize {
        let subscribers = match self.directory.subscribers(location).await {
            Ok(subs) => subs,
            Err(e) => {
                error!(city = %location, error = %e, "failed to fetch subscribers");
                return 0;
            }
        };

        if subscribers.is_empty() {
            info!(city = %location, "no subscribers found");
            return 0;
        }

        let mut sent = 0;
        for sub in &subscribers {
            let phone = self.normalizer.normalize(&sub.whatsapp_no);
            let address = chat_address(&phone);
            let text = render_alert(
                &sub.full_name,
                location,
                self.settings.forecast_hour,
                aqi,
                pm25,
            );

            match self.send_one(&address, &text).await {
                Ok(()) => {
                    info!(name = %sub.full_name, phone = %phone, "alert delivered");
                    sent += 1;
                }
                Err(e) => warn!(name = %sub.full_name, error = %e, "alert not delivered"),
            }

            tokio::time::sleep(self.settings.message_delay).await;
        }

        sent
    }

    async fn send_one(&self, address: &str, text: &str) -> Result<(), SendError> {
        match tokio::time::timeout(self.settings.send_timeout, self.channel.send(address, text))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(SendError::new(address, "send timed out")),
        }
    }
}

pub fn render_alert(name: &str, city: &str, horizon_hours: u32, aqi: u32, pm25: f64) -> String {
    format!(
        "EXTREME POLLUTION ALERT\n\
         \n\
         Hi {name},\n\
         In {horizon_hours} hours the air quality in {city} is predicted to have an AQI level of {aqi}, and PM2.5 value of {pm25} µg/m³.\n\
         \n\
         Please stay safe and take precautions!"
    )
}
