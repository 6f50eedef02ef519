//! Event wiring: readiness lifecycle and the two independent cycles.
//!
//! The orchestrator owns the only lifecycle state of the monitor. Until the
//! device announces itself nothing runs. Once it is `Ready`, every trigger
//! spawns one weather cycle and one stock cycle. Cycles share no state, are
//! not queued or debounced, and may finish in any order.
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{debug, error, info, warn};
use strum_macros::Display;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use watch_common::{DevicePayload, MonitorError, Result};

use crate::alert::AlertDispatcher;
use crate::classifier::{classify, stock_payload};
use crate::device::{Delivery, DeviceChannel};
use crate::feeds::{QuoteSource, WeatherSource};
use crate::location::LocationProvider;

/// External event consumed by the orchestrator.
pub enum Event {
    /// A device session started at `peer`; carries the channel bound to it.
    Ready {
        peer: SocketAddr,
        device: Arc<dyn DeviceChannel>,
    },
    /// The device at `peer` sent an application message (manual refresh).
    InboundMessage { peer: SocketAddr },
}

impl Event {
    fn name(&self) -> &'static str {
        match self {
            Event::Ready { .. } => "ready",
            Event::InboundMessage { .. } => "inbound message",
        }
    }
}

/// Why a pair of cycles was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Trigger {
    Start,
    InboundMessage,
}

/// Pairing lifecycle gating event dispatch. A readiness signal from another
/// peer replaces the session.
pub enum Lifecycle {
    Uninitialized,
    Ready {
        peer: SocketAddr,
        device: Arc<dyn DeviceChannel>,
    },
}

/// Collaborators used by the cycles.
#[derive(Clone)]
pub struct Pipeline {
    pub location: Arc<dyn LocationProvider>,
    pub weather: Arc<dyn WeatherSource>,
    pub quotes: Arc<dyn QuoteSource>,
    pub alerts: Arc<dyn AlertDispatcher>,
}

/// Handles of the two cycles started by one trigger.
pub struct CycleHandles {
    pub weather: JoinHandle<()>,
    pub stock: JoinHandle<()>,
}

impl CycleHandles {
    pub fn is_finished(&self) -> bool {
        self.weather.is_finished() && self.stock.is_finished()
    }

    /// Waits for both cycles.
    pub async fn join(self) {
        let _ = self.weather.await;
        let _ = self.stock.await;
    }
}

pub struct Orchestrator {
    pipeline: Pipeline,
    lifecycle: Lifecycle,
}

impl Orchestrator {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            lifecycle: Lifecycle::Uninitialized,
        }
    }

    #[cfg(test)]
    pub fn is_ready(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Ready { .. })
    }

    /// Applies one event to the lifecycle and returns the cycles it started,
    /// if any.
    pub fn handle(&mut self, event: Event) -> Option<CycleHandles> {
        info!("Event received: {}", event.name());
        match event {
            Event::Ready { peer, device } => {
                match &self.lifecycle {
                    Lifecycle::Ready { peer: current, .. } if *current == peer => {
                        debug!("Device {} already ready; readiness signal ignored", peer);
                        return None;
                    }
                    Lifecycle::Ready { peer: current, .. } => {
                        info!("Device session moved from {} to {}", current, peer);
                    }
                    Lifecycle::Uninitialized => info!("Device ready at {}", peer),
                }
                self.lifecycle = Lifecycle::Ready {
                    peer,
                    device: Arc::clone(&device),
                };
                Some(self.trigger(device, Trigger::Start))
            }
            Event::InboundMessage { peer } => match &self.lifecycle {
                Lifecycle::Uninitialized => {
                    warn!("Inbound message before readiness dropped");
                    None
                }
                Lifecycle::Ready { peer: current, .. } if *current != peer => {
                    warn!("Inbound message from unpaired peer {} dropped", peer);
                    None
                }
                Lifecycle::Ready { device, .. } => {
                    Some(self.trigger(Arc::clone(device), Trigger::InboundMessage))
                }
            },
        }
    }

    /// Consumes events until every sender is gone or `shutdown` resolves.
    ///
    /// When the event stream closes, cycles still running are awaited. On
    /// shutdown they are only reported and left to the runtime.
    pub async fn run<F>(mut self, mut events: UnboundedReceiver<Event>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut in_flight: Vec<CycleHandles> = Vec::new();
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        in_flight.retain(|handles| !handles.is_finished());
                        if let Some(handles) = self.handle(event) {
                            in_flight.push(handles);
                        }
                    }
                    None => {
                        info!("Event stream closed, waiting for {} cycle pair(s)", in_flight.len());
                        for handles in in_flight {
                            handles.join().await;
                        }
                        return;
                    }
                },
                _ = &mut shutdown => {
                    in_flight.retain(|handles| !handles.is_finished());
                    if in_flight.is_empty() {
                        info!("Shutting down with no cycles in flight");
                    } else {
                        warn!("Shutting down with {} cycle pair(s) still in flight", in_flight.len());
                    }
                    return;
                }
            }
        }
    }

    fn trigger(&self, device: Arc<dyn DeviceChannel>, trigger: Trigger) -> CycleHandles {
        let pipeline = self.pipeline.clone();
        let weather_device = Arc::clone(&device);
        let weather = tokio::spawn(async move {
            let outcome = weather_cycle(
                pipeline.location.as_ref(),
                pipeline.weather.as_ref(),
                weather_device.as_ref(),
            )
            .await;
            report("Weather", trigger, outcome);
        });

        let pipeline = self.pipeline.clone();
        let stock = tokio::spawn(async move {
            let outcome = stock_cycle(
                pipeline.quotes.as_ref(),
                pipeline.alerts.as_ref(),
                device.as_ref(),
            )
            .await;
            report("Stock", trigger, outcome);
        });

        CycleHandles { weather, stock }
    }
}

/// Location → weather feed → device.
pub async fn weather_cycle(
    location: &dyn LocationProvider,
    weather: &dyn WeatherSource,
    device: &dyn DeviceChannel,
) -> Result<Delivery> {
    let coordinates = location
        .locate()
        .await
        .inspect_err(|e| error!("Error requesting location: {}", e))?;
    let record = weather.fetch(coordinates).await?;
    info!("Temperature is {}", record.temperature_celsius);
    info!("Conditions are {}", record.condition);
    let payload = DevicePayload::weather(record.temperature_celsius, &record.condition)?;
    device.send(payload).await
}

/// Quote feed → first record → classifier → (alert) → device.
pub async fn stock_cycle(
    quotes: &dyn QuoteSource,
    alerts: &dyn AlertDispatcher,
    device: &dyn DeviceChannel,
) -> Result<Delivery> {
    let records = quotes.fetch().await?;
    // Position-dependent: the first record is shown whatever its symbol.
    let record = records.into_iter().next().ok_or(MonitorError::EmptyFeed)?;
    info!(
        "Symbol: {} Ask value: {} Change value: {}",
        record.symbol, record.ask, record.change
    );

    let classification = classify(&record);
    match classification.rate {
        Some(rate) => info!("Change rate: {}", rate),
        None => info!("Change rate: ask equals change, no division"),
    }
    if let Some(direction) = classification.alert {
        alerts.dispatch(direction);
    }

    let payload = stock_payload(&record, &classification)?;
    device.send(payload).await
}

fn report(branch: &str, trigger: Trigger, outcome: Result<Delivery>) {
    match outcome {
        Ok(Delivery::Acked) => info!("{} info sent to device successfully! ({})", branch, trigger),
        Ok(Delivery::Nacked(reason)) => {
            error!("Error sending {} info to device: {} ({})", branch, reason, trigger)
        }
        Err(e) => error!("{} cycle aborted: {} ({})", branch, e, trigger),
    }
}

#[cfg(test)]
mod tests {
    use std::future;
    use std::sync::Mutex;

    use super::*;
    use crate::alert::AlertDirection;
    use crate::feeds::QuoteRecord;
    use crate::feeds::weather::WeatherRecord;
    use crate::http_client::BoxFuture;
    use crate::location::{Coordinates, FixedLocation};
    use watch_common::{AppKey, PayloadKind, PayloadValue};

    struct StaticQuotes(Result<Vec<QuoteRecord>, String>);

    impl QuoteSource for StaticQuotes {
        fn fetch(&self) -> BoxFuture<'_, Result<Vec<QuoteRecord>>> {
            let outcome = self.0.clone().map_err(MonitorError::Transport);
            Box::pin(async move { outcome })
        }
    }

    struct StaticWeather(Result<WeatherRecord, String>);

    impl WeatherSource for StaticWeather {
        fn fetch(&self, _coordinates: Coordinates) -> BoxFuture<'_, Result<WeatherRecord>> {
            let outcome = self.0.clone().map_err(MonitorError::MalformedResponse);
            Box::pin(async move { outcome })
        }
    }

    #[derive(Default)]
    struct RecordingAlerts(Mutex<Vec<AlertDirection>>);

    impl AlertDispatcher for RecordingAlerts {
        fn dispatch(&self, direction: AlertDirection) {
            self.0.lock().expect("alerts lock").push(direction);
        }
    }

    impl RecordingAlerts {
        fn sent(&self) -> Vec<AlertDirection> {
            self.0.lock().expect("alerts lock").clone()
        }
    }

    #[derive(Default)]
    struct RecordingDevice(Mutex<Vec<DevicePayload>>);

    impl DeviceChannel for RecordingDevice {
        fn send(&self, payload: DevicePayload) -> BoxFuture<'_, Result<Delivery>> {
            self.0.lock().expect("device lock").push(payload);
            Box::pin(async { Ok(Delivery::Acked) })
        }
    }

    impl RecordingDevice {
        fn payloads(&self) -> Vec<DevicePayload> {
            self.0.lock().expect("device lock").clone()
        }
    }

    fn quote(symbol: &str, ask: f64, change: f64) -> QuoteRecord {
        QuoteRecord::from_values(symbol, ask, change)
    }

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn clear_sky() -> WeatherRecord {
        WeatherRecord {
            temperature_celsius: 18,
            condition: String::from("Clear"),
        }
    }

    fn pipeline(
        quotes: Result<Vec<QuoteRecord>, String>,
        weather: Result<WeatherRecord, String>,
        alerts: Arc<RecordingAlerts>,
    ) -> Pipeline {
        Pipeline {
            location: Arc::new(FixedLocation(Coordinates::new(10.0, 20.0).expect("valid"))),
            weather: Arc::new(StaticWeather(weather)),
            quotes: Arc::new(StaticQuotes(quotes)),
            alerts,
        }
    }

    #[tokio::test]
    async fn stock_cycle_uses_the_first_record_and_fires_alert() {
        let alerts = RecordingAlerts::default();
        let device = RecordingDevice::default();
        let quotes = StaticQuotes(Ok(vec![
            quote("PBR", 100.0, 5.0),
            quote("YHOO", 100.0, -50.0),
        ]));

        let delivery = stock_cycle(&quotes, &alerts, &device).await.expect("cycle ok");

        assert_eq!(delivery, Delivery::Acked);
        assert_eq!(alerts.sent(), vec![AlertDirection::Up]);
        let payloads = device.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].kind(), Some(PayloadKind::Stock));
        assert_eq!(
            payloads[0].get(AppKey::Symbol).and_then(PayloadValue::as_text),
            Some("PBR")
        );
        assert_eq!(
            payloads[0].get(AppKey::Face).and_then(PayloadValue::as_int),
            Some(2)
        );
    }

    #[tokio::test]
    async fn empty_feed_sends_nothing() {
        let alerts = RecordingAlerts::default();
        let device = RecordingDevice::default();

        let err = stock_cycle(&StaticQuotes(Ok(Vec::new())), &alerts, &device)
            .await
            .expect_err("empty feed");

        assert!(matches!(err, MonitorError::EmptyFeed));
        assert!(device.payloads().is_empty());
        assert!(alerts.sent().is_empty());
    }

    #[tokio::test]
    async fn unrenderable_record_sends_no_partial_payload() {
        let alerts = RecordingAlerts::default();
        let device = RecordingDevice::default();
        let long_symbol = "X".repeat(64);
        let quotes = StaticQuotes(Ok(vec![quote(&long_symbol, 100.0, 2.0)]));

        let err = stock_cycle(&quotes, &alerts, &device).await.expect_err("too long");

        assert!(matches!(err, MonitorError::InvalidPayload(_)));
        assert!(device.payloads().is_empty());
    }

    #[tokio::test]
    async fn weather_cycle_sends_temperature_and_conditions() {
        let device = RecordingDevice::default();
        let location = FixedLocation(Coordinates::new(1.0, 2.0).expect("valid"));

        weather_cycle(&location, &StaticWeather(Ok(clear_sky())), &device)
            .await
            .expect("cycle ok");

        let payloads = device.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].kind(), Some(PayloadKind::Weather));
        assert_eq!(
            payloads[0].get(AppKey::Temperature).and_then(PayloadValue::as_int),
            Some(18)
        );
    }

    #[tokio::test]
    async fn inbound_message_before_readiness_is_dropped() {
        let alerts = Arc::new(RecordingAlerts::default());
        let mut orchestrator = Orchestrator::new(pipeline(
            Ok(vec![quote("PBR", 100.0, 2.0)]),
            Ok(clear_sky()),
            alerts,
        ));

        assert!(orchestrator.handle(Event::InboundMessage { peer: peer(9001) }).is_none());
        assert!(!orchestrator.is_ready());
    }

    #[tokio::test]
    async fn readiness_runs_both_branches_once() {
        let alerts = Arc::new(RecordingAlerts::default());
        let device = Arc::new(RecordingDevice::default());
        let mut orchestrator = Orchestrator::new(pipeline(
            Ok(vec![quote("PBR", 100.0, -6.0)]),
            Ok(clear_sky()),
            alerts.clone(),
        ));

        let handles = orchestrator
            .handle(Event::Ready {
                peer: peer(9001),
                device: device.clone(),
            })
            .expect("cycles started");
        handles.join().await;

        assert!(orchestrator.is_ready());
        let kinds: Vec<_> = device.payloads().iter().map(DevicePayload::kind).collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains(&Some(PayloadKind::Weather)));
        assert!(kinds.contains(&Some(PayloadKind::Stock)));
        assert_eq!(alerts.sent(), vec![AlertDirection::Down]);
    }

    #[tokio::test]
    async fn second_readiness_signal_is_ignored() {
        let alerts = Arc::new(RecordingAlerts::default());
        let device = Arc::new(RecordingDevice::default());
        let mut orchestrator = Orchestrator::new(pipeline(
            Ok(vec![quote("PBR", 100.0, 2.0)]),
            Ok(clear_sky()),
            alerts,
        ));

        orchestrator
            .handle(Event::Ready {
                peer: peer(9001),
                device: device.clone(),
            })
            .expect("cycles started")
            .join()
            .await;
        let again = orchestrator.handle(Event::Ready {
            peer: peer(9001),
            device: device.clone(),
        });

        assert!(again.is_none());
        assert_eq!(device.payloads().len(), 2);
    }

    #[tokio::test]
    async fn inbound_message_reruns_both_branches() {
        let alerts = Arc::new(RecordingAlerts::default());
        let device = Arc::new(RecordingDevice::default());
        let mut orchestrator = Orchestrator::new(pipeline(
            Ok(vec![quote("PBR", 100.0, 2.0)]),
            Ok(clear_sky()),
            alerts.clone(),
        ));

        orchestrator
            .handle(Event::Ready {
                peer: peer(9001),
                device: device.clone(),
            })
            .expect("cycles started")
            .join()
            .await;
        orchestrator
            .handle(Event::InboundMessage { peer: peer(9001) })
            .expect("cycles started")
            .join()
            .await;

        assert_eq!(device.payloads().len(), 4);
        assert!(alerts.sent().is_empty());
    }

    #[tokio::test]
    async fn failing_weather_branch_does_not_block_stock() {
        let alerts = Arc::new(RecordingAlerts::default());
        let device = Arc::new(RecordingDevice::default());
        let mut orchestrator = Orchestrator::new(pipeline(
            Ok(vec![quote("PBR", 100.0, 2.0)]),
            Err(String::from("weather[0].main is missing")),
            alerts,
        ));

        orchestrator
            .handle(Event::Ready {
                peer: peer(9001),
                device: device.clone(),
            })
            .expect("cycles started")
            .join()
            .await;

        let payloads = device.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].kind(), Some(PayloadKind::Stock));
    }

    #[tokio::test]
    async fn malformed_later_quote_does_not_block_the_first() {
        use crate::feeds::YqlQuoteSource;
        use crate::http_client::testing::RecordingHttpClient;
        use watch_common::tickers::WATCHLIST;

        let body = r#"{"query":{"results":{"quote":[
            {"symbol":"PBR","AskRealtime":"8.50","ChangeRealtime":"+0.12"},
            {"symbol":"YHOO","AskRealtime":null,"ChangeRealtime":"-0.40"}
        ]}}}"#;
        let quotes = YqlQuoteSource::new(RecordingHttpClient::json(body), "https://yql.test", &WATCHLIST);
        let alerts = RecordingAlerts::default();
        let device = RecordingDevice::default();

        stock_cycle(&quotes, &alerts, &device).await.expect("cycle ok");

        let payloads = device.payloads();
        assert_eq!(payloads.len(), 1);
        assert_eq!(
            payloads[0].get(AppKey::Symbol).and_then(PayloadValue::as_text),
            Some("PBR")
        );
        assert_eq!(
            payloads[0].get(AppKey::Current).and_then(PayloadValue::as_text),
            Some("8.50")
        );
    }

    #[tokio::test]
    async fn readiness_from_a_new_peer_starts_a_new_session() {
        let alerts = Arc::new(RecordingAlerts::default());
        let old_face = Arc::new(RecordingDevice::default());
        let new_face = Arc::new(RecordingDevice::default());
        let mut orchestrator = Orchestrator::new(pipeline(
            Ok(vec![quote("PBR", 100.0, 2.0)]),
            Ok(clear_sky()),
            alerts,
        ));

        orchestrator
            .handle(Event::Ready {
                peer: peer(9001),
                device: old_face.clone(),
            })
            .expect("cycles started")
            .join()
            .await;
        orchestrator
            .handle(Event::Ready {
                peer: peer(9002),
                device: new_face.clone(),
            })
            .expect("new session starts cycles")
            .join()
            .await;
        orchestrator
            .handle(Event::InboundMessage { peer: peer(9002) })
            .expect("cycles started")
            .join()
            .await;

        assert_eq!(old_face.payloads().len(), 2);
        assert_eq!(new_face.payloads().len(), 4);
    }

    #[tokio::test]
    async fn inbound_message_from_an_unpaired_peer_is_dropped() {
        let alerts = Arc::new(RecordingAlerts::default());
        let device = Arc::new(RecordingDevice::default());
        let mut orchestrator = Orchestrator::new(pipeline(
            Ok(vec![quote("PBR", 100.0, 2.0)]),
            Ok(clear_sky()),
            alerts,
        ));

        orchestrator
            .handle(Event::Ready {
                peer: peer(9001),
                device: device.clone(),
            })
            .expect("cycles started")
            .join()
            .await;

        assert!(orchestrator.handle(Event::InboundMessage { peer: peer(9002) }).is_none());
        assert_eq!(device.payloads().len(), 2);
    }

    #[tokio::test]
    async fn run_waits_for_running_cycles_when_the_event_stream_closes() {
        let alerts = Arc::new(RecordingAlerts::default());
        let device = Arc::new(RecordingDevice::default());
        let orchestrator = Orchestrator::new(pipeline(
            Ok(vec![quote("PBR", 100.0, 2.0)]),
            Ok(clear_sky()),
            alerts,
        ));
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(Event::Ready {
            peer: peer(9001),
            device: device.clone(),
        })
        .ok()
        .expect("send");
        drop(tx);

        orchestrator.run(rx, future::pending()).await;

        assert_eq!(device.payloads().len(), 2);
    }

    #[tokio::test]
    async fn run_returns_on_shutdown() {
        let alerts = Arc::new(RecordingAlerts::default());
        let orchestrator = Orchestrator::new(pipeline(Ok(Vec::new()), Ok(clear_sky()), alerts));
        let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();

        orchestrator.run(rx, future::ready(())).await;
    }
}
