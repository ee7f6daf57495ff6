use std::collections::VecDeque;
use std::marker::PhantomData;

/// Drives a pure `transition` function on the calling thread.
///
/// Effects are interpreted one at a time, in the order they were emitted,
/// and each interpreted effect answers with exactly one event.
pub struct StateMachine<TState, TEvent, TEffect, T, R, E>
where
    T: Fn(TState, TEvent) -> (TState, Vec<TEffect>),
    R: FnMut(&TState),
    E: FnMut(TEffect) -> TEvent,
{
    pub init: (TState, Vec<TEffect>),
    pub transition_fn: T,
    pub render_fn: R,
    pub run_effect_fn: E,
    _event: PhantomData<TEvent>,
}

impl<TState, TEvent, TEffect, T, R, E> StateMachine<TState, TEvent, TEffect, T, R, E>
where
    T: Fn(TState, TEvent) -> (TState, Vec<TEffect>),
    R: FnMut(&TState),
    E: FnMut(TEffect) -> TEvent,
{
    pub fn new(
        init: (TState, Vec<TEffect>),
        transition_fn: T,
        render_fn: R,
        run_effect_fn: E,
    ) -> Self {
        Self {
            init,
            transition_fn,
            render_fn,
            run_effect_fn,
            _event: PhantomData,
        }
    }

    /// Runs until `is_done` holds or no effects are left, returning the last state.
    pub fn run(mut self, is_done: impl Fn(&TState) -> bool) -> TState {
        let (mut state, effects) = self.init;
        let mut pending: VecDeque<TEffect> = effects.into();

        (self.render_fn)(&state);

        while !is_done(&state) {
            let Some(effect) = pending.pop_front() else {
                break;
            };

            let event = (self.run_effect_fn)(effect);
            let (new_state, new_effects) = (self.transition_fn)(state, event);
            state = new_state;
            (self.render_fn)(&state);
            pending.extend(new_effects);
        }

        state
    }
}
