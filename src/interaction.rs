//! Idle auto-rotation state machine
//!
//! Tracks whether the user is manipulating the camera and toggles the
//! controls' auto-rotate flag accordingly. Resuming is debounced: after the
//! last interaction ends, rotation only restarts once the resume delay has
//! elapsed without a new interaction.
//!
//! The machine owns no clock. Every transition takes the current [`Instant`],
//! and the pending resume timer is a deadline checked by [`poll`]. This keeps
//! the transition table testable without sleeping.
//!
//! [`poll`]: InteractionStateMachine::poll

use std::time::{Duration, Instant};

/// Receiver of the auto-rotate flag.
pub trait AutoRotateTarget {
    fn set_auto_rotate(&mut self, enabled: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionEvent {
    /// Pointer down, or the start of a drag gesture.
    Start,
    /// Pointer up or cancel, or the end of a drag gesture.
    End,
    /// A single wheel tick: `Start` immediately followed by `End`.
    Wheel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionState {
    IdleRotating,
    /// Resume timer pending.
    IdlePaused { resume_at: Instant },
    Interacting,
}

#[derive(Debug, Clone)]
pub struct InteractionStateMachine {
    state: InteractionState,
    resume_delay: Duration,
}

impl InteractionStateMachine {
    pub fn new(resume_delay: Duration) -> Self {
        Self {
            state: InteractionState::IdleRotating,
            resume_delay,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn resume_delay(&self) -> Duration {
        self.resume_delay
    }

    pub fn is_interacting(&self) -> bool {
        self.state == InteractionState::Interacting
    }

    /// Deadline of the pending resume timer, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            InteractionState::IdlePaused { resume_at } => Some(resume_at),
            _ => None,
        }
    }

    /// Applies one event. The only side effect outside the machine is the
    /// auto-rotate flag written to `target`.
    pub fn dispatch<T: AutoRotateTarget + ?Sized>(
        &mut self,
        event: InteractionEvent,
        now: Instant,
        target: &mut T,
    ) {
        match event {
            InteractionEvent::Start => self.start(target),
            InteractionEvent::End => self.end(now),
            InteractionEvent::Wheel => {
                self.start(target);
                self.end(now);
            }
        }
    }

    /// Fires the resume timer if its deadline has passed.
    ///
    /// Returns true when rotation was resumed by this call.
    pub fn poll<T: AutoRotateTarget + ?Sized>(&mut self, now: Instant, target: &mut T) -> bool {
        match self.state {
            InteractionState::IdlePaused { resume_at } if now >= resume_at => {
                target.set_auto_rotate(true);
                self.state = InteractionState::IdleRotating;
                log::debug!("idle rotation resumed");
                true
            }
            _ => false,
        }
    }

    fn start<T: AutoRotateTarget + ?Sized>(&mut self, target: &mut T) {
        // Entering `Interacting` drops any pending deadline.
        target.set_auto_rotate(false);
        if self.state != InteractionState::Interacting {
            log::debug!("interaction started ({:?})", self.state);
        }
        self.state = InteractionState::Interacting;
    }

    fn end(&mut self, now: Instant) {
        let resume_at = now + self.resume_delay;
        self.state = InteractionState::IdlePaused { resume_at };
    }
}

impl Default for InteractionStateMachine {
    fn default() -> Self {
        Self::new(crate::config::RESUME_DELAY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every write so tests can check both value and history.
    #[derive(Default)]
    struct Flag {
        value: bool,
        writes: Vec<bool>,
    }

    impl Flag {
        fn on() -> Self {
            Self {
                value: true,
                writes: Vec::new(),
            }
        }
    }

    impl AutoRotateTarget for Flag {
        fn set_auto_rotate(&mut self, enabled: bool) {
            self.value = enabled;
            self.writes.push(enabled);
        }
    }

    const DELAY: Duration = Duration::from_millis(900);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_initial_state_is_rotating() {
        let machine = InteractionStateMachine::new(DELAY);
        assert_eq!(machine.state(), InteractionState::IdleRotating);
        assert_eq!(machine.next_deadline(), None);
    }

    #[test]
    fn test_start_disables_rotation_until_end_plus_delay() {
        let t0 = Instant::now();
        let mut machine = InteractionStateMachine::new(DELAY);
        let mut flag = Flag::on();

        machine.dispatch(InteractionEvent::Start, t0, &mut flag);
        assert!(!flag.value);
        assert!(machine.is_interacting());

        // Holding the pointer down never resumes, however long it lasts.
        assert!(!machine.poll(t0 + ms(5_000), &mut flag));
        assert!(!flag.value);

        let released = t0 + ms(6_000);
        machine.dispatch(InteractionEvent::End, released, &mut flag);
        assert!(!flag.value);
        assert_eq!(machine.next_deadline(), Some(released + DELAY));

        assert!(!machine.poll(released + ms(899), &mut flag));
        assert!(!flag.value);

        assert!(machine.poll(released + DELAY, &mut flag));
        assert!(flag.value);
        assert_eq!(machine.state(), InteractionState::IdleRotating);
    }

    #[test]
    fn test_rapid_ends_only_last_timer_fires() {
        let t0 = Instant::now();
        let mut machine = InteractionStateMachine::new(DELAY);
        let mut flag = Flag::on();

        machine.dispatch(InteractionEvent::Start, t0, &mut flag);
        machine.dispatch(InteractionEvent::End, t0 + ms(100), &mut flag);
        machine.dispatch(InteractionEvent::End, t0 + ms(500), &mut flag);
        machine.dispatch(InteractionEvent::End, t0 + ms(800), &mut flag);

        // The first two deadlines have passed but were superseded.
        assert!(!machine.poll(t0 + ms(1_000), &mut flag));
        assert!(!machine.poll(t0 + ms(1_400), &mut flag));
        assert!(!flag.value);

        assert!(machine.poll(t0 + ms(1_700), &mut flag));
        assert!(flag.value);
        assert_eq!(flag.writes, vec![false, true]);
    }

    #[test]
    fn test_start_cancels_pending_timer() {
        let t0 = Instant::now();
        let mut machine = InteractionStateMachine::new(DELAY);
        let mut flag = Flag::on();

        machine.dispatch(InteractionEvent::Start, t0, &mut flag);
        machine.dispatch(InteractionEvent::End, t0 + ms(10), &mut flag);
        machine.dispatch(InteractionEvent::Start, t0 + ms(500), &mut flag);

        assert_eq!(machine.next_deadline(), None);
        assert!(!machine.poll(t0 + ms(2_000), &mut flag));
        assert!(!flag.value);
    }

    #[test]
    fn test_wheel_rearms_countdown() {
        let t0 = Instant::now();
        let mut machine = InteractionStateMachine::new(DELAY);
        let mut flag = Flag::on();

        machine.dispatch(InteractionEvent::Wheel, t0, &mut flag);
        assert_eq!(machine.next_deadline(), Some(t0 + DELAY));

        machine.dispatch(InteractionEvent::Wheel, t0 + ms(600), &mut flag);
        assert!(!machine.poll(t0 + DELAY, &mut flag));

        assert!(machine.poll(t0 + ms(600) + DELAY, &mut flag));
        assert!(flag.value);
    }

    #[test]
    fn test_lone_wheel_leaves_rotation_on_after_delay() {
        let t0 = Instant::now();
        let mut machine = InteractionStateMachine::new(DELAY);
        let mut flag = Flag::on();

        machine.dispatch(InteractionEvent::Wheel, t0, &mut flag);
        machine.poll(t0 + DELAY, &mut flag);

        assert!(flag.value);
        assert_eq!(machine.state(), InteractionState::IdleRotating);
    }

    #[test]
    fn test_end_without_start_keeps_flag_untouched() {
        let t0 = Instant::now();
        let mut machine = InteractionStateMachine::new(DELAY);
        let mut flag = Flag::on();

        machine.dispatch(InteractionEvent::End, t0, &mut flag);
        assert!(flag.writes.is_empty());
        assert_eq!(
            machine.state(),
            InteractionState::IdlePaused {
                resume_at: t0 + DELAY
            }
        );
    }

    #[test]
    fn test_poll_is_noop_without_timer() {
        let mut machine = InteractionStateMachine::new(DELAY);
        let mut flag = Flag::default();
        assert!(!machine.poll(Instant::now(), &mut flag));
        assert!(flag.writes.is_empty());
    }
}
