// Finite-state machine engine
//
// A machine is a `TransitionTable` over a closed state set and a closed
// action set, executed by `FsmRuntime` against a `VersionedStore`.

pub mod error;
pub mod runtime;
pub mod table;

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::hash::Hash;

pub use error::{FsmError, ValidationError};
pub use runtime::{FsmRuntime, RuntimeTimeouts};
pub use table::{Rejected, TableError, Transition, TransitionTable, TransitionTableBuilder};

/// Closed set of states a machine can be in
pub trait FsmState: Copy + Eq + Hash + Debug + Display + Send + Sync + 'static {
    /// Every declared state, in declaration order
    const ALL: &'static [Self];

    fn as_str(&self) -> &'static str;
}

/// Payload-carrying action; the table is keyed by its `Kind`
pub trait FsmAction: Debug + Send + Sync + 'static {
    type Kind: Copy + Eq + Hash + Debug + Display + Send + Sync + 'static;

    fn kind(&self) -> Self::Kind;
}

/// State bookkeeping stored alongside every document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsmMeta<S> {
    pub state: S,
    /// Name of the action that produced `state`
    #[serde(default, rename = "lastTransition", skip_serializing_if = "Option::is_none")]
    pub last_transition: Option<String>,
}

/// A business item together with its machine state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stateful<T, S> {
    #[serde(flatten)]
    pub item: T,
    pub fsm: FsmMeta<S>,
}

impl<T, S: Copy> Stateful<T, S> {
    pub fn new(item: T, state: S) -> Self {
        Self {
            item,
            fsm: FsmMeta {
                state,
                last_transition: None,
            },
        }
    }

    pub fn state(&self) -> S {
        self.fsm.state
    }
}
