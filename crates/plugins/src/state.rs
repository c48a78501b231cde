//! State plugins: host actions bound to the entry (`pre`) or exit (`post`)
//! of specific states.
//!
//! Non-blocking state plugins are wired into the state machine as entry/exit
//! actions. Blocking ones are awaited by the runner itself, before the
//! transition (`pre`) or after all other plugin phases (`post`).

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::StateAction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum When {
    Pre,
    Post,
}

#[derive(Clone)]
pub struct StatePlugin {
    pub name: String,
    pub state_names: Vec<String>,
    pub when: When,
    pub is_blocking: bool,
    pub action: Arc<dyn StateAction>,
}

impl StatePlugin {
    pub fn new(
        name: impl Into<String>,
        state_names: impl IntoIterator<Item = impl Into<String>>,
        when: When,
        is_blocking: bool,
        action: Arc<dyn StateAction>,
    ) -> Self {
        Self {
            name: name.into(),
            state_names: state_names.into_iter().map(Into::into).collect(),
            when,
            is_blocking,
            action,
        }
    }

    pub fn applies_to(&self, state: &str) -> bool {
        self.state_names.iter().any(|s| s == state)
    }
}

impl fmt::Debug for StatePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatePlugin")
            .field("name", &self.name)
            .field("state_names", &self.state_names)
            .field("when", &self.when)
            .field("is_blocking", &self.is_blocking)
            .finish_non_exhaustive()
    }
}
