use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use crate::dispatcher::{KeySink, TriggerDispatcher};
use crate::gestures::{Classifier, GestureState, ScreenPowerState, Trigger};
use crate::tracker::TouchSample;
use crate::tunables::{GestureConfig, Tunables};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Sample(TouchSample),
    ContactReset,
    PanelPowerOn,
    PanelPreDeinit,
}

/// Whether samples can reach the classifier at all for this config and screen state.
pub fn accepts_samples(config: &GestureConfig, power_state: ScreenPowerState) -> bool {
    match power_state {
        ScreenPowerState::Suspended => config.wake_enabled,
        ScreenPowerState::Active => config.sleep_enabled,
    }
}

/// Cheap, cloneable entry point for the event producers. Posting never blocks.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: UnboundedSender<SessionEvent>,
    suspended: Arc<AtomicBool>,
    tunables: Arc<Tunables>,
}

impl SessionHandle {
    fn post(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            log::debug!("Session is gone, dropping {:?}", event);
        }
    }

    /// Gate for the raw event path: positions are not tracked while the gesture family for the
    /// current screen state is disabled.
    pub fn accepts_input(&self) -> bool {
        let power_state = if self.suspended.load(Ordering::Acquire) {
            ScreenPowerState::Suspended
        } else {
            ScreenPowerState::Active
        };
        accepts_samples(&self.tunables.snapshot(), power_state)
    }

    pub fn submit_sample(&self, sample: TouchSample) {
        self.post(SessionEvent::Sample(sample));
    }

    pub fn on_contact_reset(&self) {
        self.post(SessionEvent::ContactReset);
    }

    pub fn on_panel_power_on(&self) {
        self.post(SessionEvent::PanelPowerOn);
    }

    pub fn on_panel_pre_deinit(&self) {
        self.post(SessionEvent::PanelPreDeinit);
    }
}

/// Owns the per-contact gesture state and the screen power state. Every mutation happens on
/// the single task running [`SessionController::run`], one event at a time.
pub struct SessionController<S> {
    rx: UnboundedReceiver<SessionEvent>,
    classifier: Classifier,
    dispatcher: TriggerDispatcher<S>,
    tunables: Arc<Tunables>,
    state: GestureState,
    power_state: ScreenPowerState,
    suspended: Arc<AtomicBool>,
}

impl<S: KeySink> SessionController<S> {
    pub fn new(classifier: Classifier, dispatcher: TriggerDispatcher<S>, tunables: Arc<Tunables>) -> (SessionHandle, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let suspended = Arc::new(AtomicBool::new(false));
        let handle = SessionHandle {
            tx,
            suspended: Arc::clone(&suspended),
            tunables: Arc::clone(&tunables),
        };
        let controller = Self {
            rx,
            classifier,
            dispatcher,
            tunables,
            state: GestureState::default(),
            power_state: ScreenPowerState::Active,
            suspended,
        };
        (handle, controller)
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn power_state(&self) -> ScreenPowerState {
        self.power_state
    }

    /// Runs until every [`SessionHandle`] is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            self.handle(event);
        }
        log::debug!("Session closed");
    }

    /// Handles whatever is queued without waiting for more.
    #[cfg(test)]
    pub fn process_pending(&mut self) -> Vec<Trigger> {
        let mut triggers = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            triggers.extend(self.handle(event));
        }
        triggers
    }

    pub fn handle(&mut self, event: SessionEvent) -> Option<Trigger> {
        match event {
            SessionEvent::Sample(sample) => return self.on_sample(sample),
            SessionEvent::ContactReset => self.state.reset(),
            SessionEvent::PanelPowerOn => self.set_power_state(ScreenPowerState::Active),
            SessionEvent::PanelPreDeinit => self.set_power_state(ScreenPowerState::Suspended),
        }
        None
    }

    fn set_power_state(&mut self, power_state: ScreenPowerState) {
        if self.power_state != power_state {
            log::info!("Screen is now {:?}", power_state);
        }
        self.power_state = power_state;
        self.suspended.store(power_state == ScreenPowerState::Suspended, Ordering::Release);
    }

    fn on_sample(&mut self, sample: TouchSample) -> Option<Trigger> {
        let config = self.tunables.snapshot();
        // Settings may have changed since the sample was posted.
        if !accepts_samples(&config, self.power_state) {
            return None;
        }

        let trigger = self.classifier.classify(sample, self.power_state, &config, &mut self.state)?;
        self.dispatcher.dispatch(trigger, config.key_hold_ms);
        Some(trigger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::config::Geometry;
    use crate::dispatcher::tests::RecordingSink;
    use crate::gestures::Stage;

    fn controller(config: GestureConfig) -> (SessionHandle, SessionController<RecordingSink>, RecordingSink, Arc<Tunables>) {
        let sink = RecordingSink::default();
        let tunables = Arc::new(Tunables::new(config));
        let (handle, controller) = SessionController::new(
            Classifier::new(Geometry::default()),
            TriggerDispatcher::new(sink.clone()),
            Arc::clone(&tunables),
        );
        (handle, controller, sink, tunables)
    }

    fn feed(controller: &mut SessionController<RecordingSink>, samples: &[(i32, i32)]) -> Vec<Option<Trigger>> {
        samples.iter()
            .map(|&(x, y)| controller.handle(SessionEvent::Sample(TouchSample { x, y })))
            .collect()
    }

    const WAKE_SWIPE: [(i32, i32); 3] = [(50, 10), (200, 10), (610, 10)];

    #[tokio::test]
    async fn starts_active() {
        let (handle, controller, _, _) = controller(GestureConfig::default());
        assert_eq!(controller.power_state(), ScreenPowerState::Active);
        assert!(handle.accepts_input());
    }

    #[tokio::test(start_paused = true)]
    async fn wake_swipe_presses_power_key() {
        let (_handle, mut controller, sink, _) = controller(GestureConfig { wake_enabled: true, ..GestureConfig::default() });
        controller.handle(SessionEvent::PanelPreDeinit);

        assert_eq!(feed(&mut controller, &WAKE_SWIPE), vec![None, None, Some(Trigger::Wake)]);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sink.pulses(), 1);
    }

    #[tokio::test]
    async fn contact_reset_restores_initial_state() {
        let (_handle, mut controller, _, _) = controller(GestureConfig::default());
        feed(&mut controller, &[(500, 1200), (250, 1200)]);
        assert_eq!(controller.state().sleep, Stage::Stage1Latched);
        assert!(controller.state().screen_touched);

        controller.handle(SessionEvent::ContactReset);
        assert_eq!(*controller.state(), GestureState::default());
    }

    #[tokio::test]
    async fn one_trigger_per_contact() {
        let (_handle, mut controller, _, _) = controller(GestureConfig { wake_enabled: true, ..GestureConfig::default() });
        controller.handle(SessionEvent::PanelPreDeinit);

        let mut out = feed(&mut controller, &WAKE_SWIPE);
        out.extend(feed(&mut controller, &WAKE_SWIPE));
        assert_eq!(out.iter().flatten().count(), 1);

        controller.handle(SessionEvent::ContactReset);
        assert_eq!(feed(&mut controller, &WAKE_SWIPE), vec![None, None, Some(Trigger::Wake)]);
    }

    #[tokio::test]
    async fn disabling_wake_mid_contact_suppresses_trigger() {
        let (_handle, mut controller, _, tunables) = controller(GestureConfig { wake_enabled: true, ..GestureConfig::default() });
        controller.handle(SessionEvent::PanelPreDeinit);

        feed(&mut controller, &WAKE_SWIPE[..2]);
        assert_eq!(controller.state().wake, Stage::Stage1Latched);

        tunables.set("s2w_enabled", "0").unwrap();
        assert_eq!(feed(&mut controller, &WAKE_SWIPE[2..]), vec![None]);
        assert_eq!(controller.state().wake, Stage::Stage1Latched);
    }

    #[tokio::test]
    async fn gated_samples_leave_state_untouched() {
        let (handle, mut controller, _, _) = controller(GestureConfig { sleep_enabled: false, ..GestureConfig::default() });
        assert!(!handle.accepts_input());

        feed(&mut controller, &[(500, 1200), (250, 1200)]);
        assert_eq!(*controller.state(), GestureState::default());

        // Wake is disabled too, so suspending does not open the gate.
        controller.handle(SessionEvent::PanelPreDeinit);
        assert!(!handle.accepts_input());
    }

    #[tokio::test]
    async fn panel_events_switch_gesture_family() {
        let (handle, mut controller, _, _) = controller(GestureConfig { wake_enabled: true, sleep_enabled: false, ..GestureConfig::default() });
        assert!(!handle.accepts_input());

        controller.handle(SessionEvent::PanelPreDeinit);
        assert_eq!(controller.power_state(), ScreenPowerState::Suspended);
        assert!(handle.accepts_input());

        controller.handle(SessionEvent::PanelPowerOn);
        assert_eq!(controller.power_state(), ScreenPowerState::Active);
        assert!(!handle.accepts_input());
    }

    #[tokio::test(start_paused = true)]
    async fn run_processes_posted_events_in_order() {
        let (handle, controller, sink, _) = controller(GestureConfig { wake_enabled: true, ..GestureConfig::default() });
        let task = tokio::spawn(controller.run());

        handle.on_panel_pre_deinit();
        for (x, y) in WAKE_SWIPE {
            handle.submit_sample(TouchSample { x, y });
        }
        handle.on_contact_reset();
        drop(handle);

        task.await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(sink.pulses(), 1);
    }
}
