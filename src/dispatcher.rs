use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use crate::gestures::Trigger;

/// Receiver of the synthetic power key.
pub trait KeySink: Send + 'static {
    fn press(&mut self, down: bool) -> std::io::Result<()>;
}

/// Turns triggers into power-key pulses. Only one pulse runs at a time; a trigger arriving
/// while a pulse is in flight is dropped, never queued.
#[derive(Debug)]
pub struct TriggerDispatcher<S> {
    sink: Arc<Mutex<S>>,
}

impl<S> Clone for TriggerDispatcher<S> {
    fn clone(&self) -> Self {
        Self { sink: Arc::clone(&self.sink) }
    }
}

impl<S: KeySink> TriggerDispatcher<S> {
    pub fn new(sink: S) -> Self {
        Self { sink: Arc::new(Mutex::new(sink)) }
    }

    /// Must be called from within a tokio runtime. Returns the pulse task, or `None` if another
    /// pulse holds the key.
    pub fn dispatch(&self, trigger: Trigger, hold_ms: u32) -> Option<JoinHandle<()>> {
        let Ok(guard) = Arc::clone(&self.sink).try_lock_owned() else {
            log::debug!("Power key busy, dropping {:?}", trigger);
            return None;
        };
        log::debug!("Pressing power key for {:?} ({} ms)", trigger, hold_ms);
        Some(tokio::spawn(pulse(guard, Duration::from_millis(hold_ms as u64))))
    }
}

async fn pulse<S: KeySink>(mut sink: OwnedMutexGuard<S>, hold: Duration) {
    if let Err(e) = sink.press(true) {
        log::warn!("Failed to press power key: {}", e);
    }
    tokio::time::sleep(hold).await;
    if let Err(e) = sink.press(false) {
        log::warn!("Failed to release power key: {}", e);
    }
    tokio::time::sleep(hold).await;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use tokio::time::Instant;

    /// Records presses with the (paused) tokio clock.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingSink {
        pub presses: Arc<StdMutex<Vec<(bool, Instant)>>>,
    }

    impl RecordingSink {
        pub fn pulses(&self) -> usize {
            self.presses.lock().unwrap().iter().filter(|(down, _)| *down).count()
        }
    }

    impl KeySink for RecordingSink {
        fn press(&mut self, down: bool) -> std::io::Result<()> {
            self.presses.lock().unwrap().push((down, Instant::now()));
            Ok(())
        }
    }

    struct FailingSink;

    impl KeySink for FailingSink {
        fn press(&mut self, _down: bool) -> std::io::Result<()> {
            Err(std::io::Error::other("device gone"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn pulse_holds_key_for_configured_duration() {
        let sink = RecordingSink::default();
        let dispatcher = TriggerDispatcher::new(sink.clone());
        let start = Instant::now();

        dispatcher.dispatch(Trigger::Wake, 60).unwrap().await.unwrap();

        let presses = sink.presses.lock().unwrap().clone();
        assert_eq!(presses.len(), 2);
        assert_eq!(presses[0], (true, start));
        assert_eq!(presses[1], (false, start + Duration::from_millis(60)));
        assert_eq!(Instant::now(), start + Duration::from_millis(120));
    }

    #[tokio::test(start_paused = true)]
    async fn second_dispatch_during_pulse_is_dropped() {
        let sink = RecordingSink::default();
        let dispatcher = TriggerDispatcher::new(sink.clone());

        let first = dispatcher.dispatch(Trigger::Sleep, 60).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(dispatcher.dispatch(Trigger::Sleep, 60).is_none());

        first.await.unwrap();
        assert_eq!(sink.pulses(), 1);

        // Once the pulse (including the trailing hold) is over the key is free again.
        dispatcher.dispatch(Trigger::Wake, 60).unwrap().await.unwrap();
        assert_eq!(sink.pulses(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn sink_errors_still_release_the_key() {
        let dispatcher = TriggerDispatcher::new(FailingSink);
        dispatcher.dispatch(Trigger::Wake, 10).unwrap().await.unwrap();
        assert!(dispatcher.dispatch(Trigger::Wake, 10).is_some());
    }
}
