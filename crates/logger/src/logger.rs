// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use actix::{Actor, Addr, Context, Handler, Message};
use ciphersum_events::{AggregatorEvent, Event, EventBus, Subscribe};
use std::marker::PhantomData;
use tracing::{error, info};

pub trait EventLogging: Event {
    fn log(&self, logger_name: &str);
}

/// Subscribes to every event on the bus and writes it to the tracing output
pub struct SimpleLogger<E: EventLogging> {
    name: String,
    logged: usize,
    _p: PhantomData<E>,
}

impl<E: EventLogging> SimpleLogger<E> {
    pub fn attach(name: &str, bus: Addr<EventBus<E>>) -> Addr<Self> {
        let addr = Self {
            name: name.to_owned(),
            logged: 0,
            _p: PhantomData,
        }
        .start();
        bus.do_send(Subscribe::<E>::new("*", addr.clone().recipient()));
        info!(logger = %name, "Logger ready");
        addr
    }
}

impl<E: EventLogging> Actor for SimpleLogger<E> {
    type Context = Context<Self>;
}

impl<E: EventLogging> Handler<E> for SimpleLogger<E> {
    type Result = ();

    fn handle(&mut self, msg: E, _: &mut Self::Context) -> Self::Result {
        self.logged += 1;
        msg.log(&self.name);
    }
}

/// Number of events this logger has written
#[derive(Message)]
#[rtype(result = "usize")]
pub struct GetLoggedCount;

impl<E: EventLogging> Handler<GetLoggedCount> for SimpleLogger<E> {
    type Result = usize;

    fn handle(&mut self, _: GetLoggedCount, _: &mut Self::Context) -> Self::Result {
        self.logged
    }
}

impl EventLogging for AggregatorEvent {
    fn log(&self, logger_name: &str) {
        match self {
            AggregatorEvent::IntegrityViolation { data, .. } => error!(
                me = logger_name,
                request_id = data.request_id,
                reason = ?data.reason,
                evt = %self,
                "Integrity violation"
            ),
            _ => match self.get_batch_id() {
                Some(batch_id) => {
                    info!(me = logger_name, evt = %self, batch_id, "Event published")
                }
                None => info!(me = logger_name, evt = %self, "Event published"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciphersum_events::{BatchOpened, GetHistory, PausedSet};

    #[actix::test]
    async fn logs_every_event() -> anyhow::Result<()> {
        let bus = EventBus::<AggregatorEvent>::default().start();
        let logger = SimpleLogger::<AggregatorEvent>::attach("test", bus.clone());

        bus.send(AggregatorEvent::from(PausedSet { paused: true }))
            .await?;
        bus.send(AggregatorEvent::from(BatchOpened { batch_id: 1 }))
            .await?;
        assert_eq!(bus.send(GetHistory::<AggregatorEvent>::new()).await?.len(), 2);

        // Both events were forwarded before the history query returned.
        assert_eq!(logger.send(GetLoggedCount).await?, 2);
        Ok(())
    }
}
