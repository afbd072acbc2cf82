use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::{FsmAction, FsmState};

/// Business-rule failure raised by a transition's effect
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct Rejected {
    pub reason: String,
}

impl Rejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors detected while building a transition table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("{machine}: transition ({from}, {action}) is declared more than once")]
    DuplicateTransition {
        machine: &'static str,
        from: String,
        action: String,
    },

    #[error("{machine}: transition table has no transitions")]
    Empty { machine: &'static str },
}

type CreateFn<T, A> = Arc<dyn Fn(&str, &A) -> Result<T, Rejected> + Send + Sync>;
type UpdateFn<T, A> = Arc<dyn Fn(&T, &A) -> Result<T, Rejected> + Send + Sync>;

enum Effect<T, A> {
    Create(CreateFn<T, A>),
    Update(UpdateFn<T, A>),
}

impl<T, A> Clone for Effect<T, A> {
    fn clone(&self) -> Self {
        match self {
            Effect::Create(f) => Effect::Create(Arc::clone(f)),
            Effect::Update(f) => Effect::Update(Arc::clone(f)),
        }
    }
}

/// One legal `(from, action) -> to` move and its effect
pub struct Transition<S, A: FsmAction, T> {
    from: Option<S>,
    action: A::Kind,
    to: S,
    effect: Effect<T, A>,
}

impl<S: FsmState, A: FsmAction, T> Transition<S, A, T> {
    /// `None` marks a creation transition (no prior state)
    pub fn from(&self) -> Option<S> {
        self.from
    }

    pub fn action(&self) -> A::Kind {
        self.action
    }

    pub fn to(&self) -> S {
        self.to
    }

    pub fn is_creation(&self) -> bool {
        self.from.is_none()
    }

    /// Run the effect, producing the next business item
    pub fn exec(&self, id: &str, current: Option<&T>, action: &A) -> Result<T, Rejected> {
        match (&self.effect, current) {
            (Effect::Create(f), _) => f(id, action),
            (Effect::Update(f), Some(item)) => f(item, action),
            (Effect::Update(_), None) => Err(Rejected::new(format!(
                "{} requires an existing item",
                self.action
            ))),
        }
    }
}

impl<S: FsmState, A: FsmAction, T> fmt::Debug for Transition<S, A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("from", &self.from)
            .field("action", &self.action)
            .field("to", &self.to)
            .finish()
    }
}

fn describe_from<S: FsmState>(from: Option<S>) -> String {
    from.map(|s| s.as_str().to_string())
        .unwrap_or_else(|| "*".to_string())
}

/// Collects transitions and validates them into a `TransitionTable`
pub struct TransitionTableBuilder<S, A: FsmAction, T> {
    machine: &'static str,
    transitions: Vec<Transition<S, A, T>>,
}

impl<S: FsmState, A: FsmAction, T> TransitionTableBuilder<S, A, T> {
    pub fn new(machine: &'static str) -> Self {
        Self {
            machine,
            transitions: Vec::new(),
        }
    }

    /// Transition taken when no item exists yet
    pub fn creation<F>(mut self, action: A::Kind, to: S, exec: F) -> Self
    where
        F: Fn(&str, &A) -> Result<T, Rejected> + Send + Sync + 'static,
    {
        self.transitions.push(Transition {
            from: None,
            action,
            to,
            effect: Effect::Create(Arc::new(exec)),
        });
        self
    }

    pub fn transition<F>(self, from: S, action: A::Kind, to: S, exec: F) -> Self
    where
        F: Fn(&T, &A) -> Result<T, Rejected> + Send + Sync + 'static,
    {
        self.transitions_from(&[from], action, to, exec)
    }

    /// Same action and effect from several source states
    pub fn transitions_from<F>(mut self, from: &[S], action: A::Kind, to: S, exec: F) -> Self
    where
        F: Fn(&T, &A) -> Result<T, Rejected> + Send + Sync + 'static,
    {
        let effect = Effect::Update(Arc::new(exec) as UpdateFn<T, A>);
        for state in from {
            self.transitions.push(Transition {
                from: Some(*state),
                action,
                to,
                effect: effect.clone(),
            });
        }
        self
    }

    pub fn build(self) -> Result<TransitionTable<S, A, T>, TableError> {
        if self.transitions.is_empty() {
            return Err(TableError::Empty {
                machine: self.machine,
            });
        }

        let mut transitions = HashMap::with_capacity(self.transitions.len());
        for transition in self.transitions {
            let key = (transition.from, transition.action);
            if transitions.contains_key(&key) {
                return Err(TableError::DuplicateTransition {
                    machine: self.machine,
                    from: describe_from(transition.from),
                    action: transition.action.to_string(),
                });
            }
            transitions.insert(key, transition);
        }

        Ok(TransitionTable {
            machine: self.machine,
            transitions,
        })
    }
}

/// Deterministic lookup of the transition for a `(state, action)` pair
pub struct TransitionTable<S, A: FsmAction, T> {
    machine: &'static str,
    transitions: HashMap<(Option<S>, A::Kind), Transition<S, A, T>>,
}

impl<S: FsmState, A: FsmAction, T> TransitionTable<S, A, T> {
    pub fn machine(&self) -> &'static str {
        self.machine
    }

    pub fn lookup(&self, from: Option<S>, action: A::Kind) -> Option<&Transition<S, A, T>> {
        self.transitions.get(&(from, action))
    }

    /// Action kinds legal from `from`
    pub fn actions_from(&self, from: Option<S>) -> Vec<A::Kind> {
        self.transitions
            .values()
            .filter(|t| t.from == from)
            .map(|t| t.action)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }
}

impl<S: FsmState, A: FsmAction, T> fmt::Debug for TransitionTable<S, A, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransitionTable")
            .field("machine", &self.machine)
            .field("transitions", &self.transitions.len())
            .finish()
    }
}
