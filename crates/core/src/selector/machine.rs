//! Single-fire selection state machine.
//!
//! The reaction prompt is naturally callback-shaped; modelling it as an
//! explicit state machine with exactly one allowed exit from `Armed` keeps
//! concurrent qualifying events from double-resolving a prompt.

/// Reaction markers are the regional indicator letters, which caps the
/// number of distinct options a prompt can offer.
pub const MAX_OPTIONS: usize = 26;

const MARKER_BASE: u32 = 0x1F1E6; // regional indicator symbol letter A

/// The reaction marker for option `index`, `None` past the marker alphabet.
pub fn marker(index: usize) -> Option<String> {
    if index >= MAX_OPTIONS {
        return None;
    }
    char::from_u32(MARKER_BASE + index as u32).map(|c| c.to_string())
}

/// Map a reaction emoji back to an option index.
///
/// Returns `None` for anything that is not a single regional indicator
/// letter.
pub fn marker_index(emoji: &str) -> Option<usize> {
    let mut chars = emoji.chars();
    let first = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let code = first as u32;
    if (MARKER_BASE..MARKER_BASE + MAX_OPTIONS as u32).contains(&code) {
        Some((code - MARKER_BASE) as usize)
    } else {
        None
    }
}

/// Selector lifecycle states. `Armed` has exactly one exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    /// Accepting events.
    Armed,
    /// A valid choice was made.
    Resolved,
    /// The deadline passed with no valid choice.
    TimedOut,
    /// A qualifying marker could not be mapped back to an option.
    Invalid,
}

/// A fired exit transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Resolve(usize),
    Expire,
    Invalidate,
}

/// Guarded state for one selection prompt.
///
/// Instances are independent per invocation; nothing is shared across
/// prompts.
#[derive(Debug)]
pub struct SelectorMachine {
    requester: String,
    /// The markers offered, in option order. Membership here is the valid
    /// set for incoming reactions.
    markers: Vec<String>,
    state: SelectorState,
}

impl SelectorMachine {
    /// Arm a machine for `option_count` options on behalf of `requester`.
    pub fn new(requester: impl Into<String>, option_count: usize) -> Self {
        Self {
            requester: requester.into(),
            markers: (0..option_count.min(MAX_OPTIONS))
                .filter_map(marker)
                .collect(),
            state: SelectorState::Armed,
        }
    }

    pub fn state(&self) -> SelectorState {
        self.state
    }

    /// Feed a reaction event into the machine.
    ///
    /// Events from any identity other than the requester, and reactions
    /// whose emoji is not in the offered marker set, are ignored without
    /// consuming the machine. The first qualifying event fires exactly once;
    /// anything arriving after a terminal state is ignored.
    pub fn handle_reaction(&mut self, user: &str, emoji: &str) -> Option<Transition> {
        if self.state != SelectorState::Armed || user != self.requester {
            return None;
        }

        if !self.markers.iter().any(|m| m == emoji) {
            return None;
        }

        // Map the qualifying marker back to its option. A marker that no
        // longer resolves to a known option exits through Invalid.
        match marker_index(emoji) {
            Some(index) if index < self.markers.len() => {
                self.state = SelectorState::Resolved;
                Some(Transition::Resolve(index))
            }
            _ => {
                self.state = SelectorState::Invalid;
                Some(Transition::Invalidate)
            }
        }
    }

    /// Fire the timeout exit, if still armed.
    pub fn expire(&mut self) -> Option<Transition> {
        if self.state != SelectorState::Armed {
            return None;
        }
        self.state = SelectorState::TimedOut;
        Some(Transition::Expire)
    }
}
