//! Single-slot downlink command mailbox
//!
//! Nodes have no continuous listen window, so a backend command waits here
//! until the target node polls with the control sentinel. There is exactly
//! one slot: a new command replaces any unsent one, and the replaced command
//! is gone.

use crate::error::CommandDecodeError;
use crate::protocol::{Address, MAX_PAYLOAD_LEN};

/// A downlink command awaiting a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCommand {
    /// Node the command is for
    pub target: Address,
    /// Command text sent as the frame payload
    pub payload: String,
}

impl PendingCommand {
    /// Validate and build a command
    ///
    /// The target must be a sensor node and the text must fit in one frame.
    pub fn new(target: Address, payload: impl Into<String>) -> Result<Self, CommandDecodeError> {
        let payload = payload.into();
        if !target.is_node() {
            return Err(CommandDecodeError::NotANode(target));
        }
        if payload.is_empty() {
            return Err(CommandDecodeError::EmptyMessage);
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(CommandDecodeError::MessageTooLong {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self { target, payload })
    }
}

/// Holder for the next unsent downlink command
#[derive(Debug, Clone, Default)]
pub struct CommandMailbox {
    slot: Option<PendingCommand>,
}

impl CommandMailbox {
    /// Create an empty mailbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a command, returning the unsent one it replaced
    pub fn set(&mut self, command: PendingCommand) -> Option<PendingCommand> {
        self.slot.replace(command)
    }

    /// Return and clear the current command
    pub fn take(&mut self) -> Option<PendingCommand> {
        self.slot.take()
    }

    /// Return and clear the current command only if it targets `node`
    ///
    /// A command for another node stays in place.
    pub fn take_for(&mut self, node: Address) -> Option<PendingCommand> {
        if self.slot.as_ref().is_some_and(|c| c.target == node) {
            self.slot.take()
        } else {
            None
        }
    }

    /// Current command without clearing it
    pub fn peek(&self) -> Option<&PendingCommand> {
        self.slot.as_ref()
    }

    /// Whether no command is waiting
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}
