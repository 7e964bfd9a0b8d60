use crate::error::Result;
use crate::services::watchdog::ProbeHandle;
use futures_util::StreamExt;
use tracing::{debug, info};
use zbus::{Connection, MatchRule, MessageStream};

const LOGIN1_NAME: &str = "org.freedesktop.login1";
const LOGIN1_MANAGER: &str = "org.freedesktop.login1.Manager";

/// После выхода из сна устройства ввода могут пересоздаваться, а захват
/// при этом пропадает. Просим watchdog проверить перехват сразу.
pub struct SleepMonitor {
    probe: ProbeHandle,
}

impl SleepMonitor {
    pub fn new(probe: ProbeHandle) -> Self {
        Self { probe }
    }

    pub async fn run(self) -> Result<()> {
        let connection = Connection::system().await?;

        let rule = MatchRule::builder()
            .msg_type(zbus::message::Type::Signal)
            .sender(LOGIN1_NAME)?
            .interface(LOGIN1_MANAGER)?
            .member("PrepareForSleep")?
            .build();
        let mut stream = MessageStream::for_match_rule(rule, &connection, None).await?;
        info!("Подписка на PrepareForSleep активна");

        while let Some(message) = stream.next().await {
            let suspending = message?.body().deserialize::<bool>()?;
            if suspending {
                debug!("Система уходит в сон");
            } else {
                info!("Система проснулась, проверяем перехват");
                self.probe.probe_now();
            }
        }

        Ok(())
    }
}
