use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of turns a conversation remembers.
pub const DEFAULT_MEMORY_TURNS: usize = 6;

/// One user input paired with the model's reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

impl Turn {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }
}

/// Fixed-capacity history of the most recent turns, oldest first.
#[derive(Debug, Clone)]
pub struct RollingMemory {
    turns: VecDeque<Turn>,
    capacity: usize,
}

impl RollingMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a turn, evicting the oldest one when full.
    pub fn push(&mut self, turn: Turn) {
        if self.capacity == 0 {
            return;
        }
        if self.turns.len() == self.capacity {
            self.turns.pop_front();
        }
        self.turns.push_back(turn);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }
}

impl Default for RollingMemory {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_TURNS)
    }
}
