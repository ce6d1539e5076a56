use crate::model::config::Suffixes;
use crate::model::mode::Mode;

/// What kind of node a name belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    Project,
    Section,
    Task,
}

/// Outcome of resolving a node's mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub mode: Mode,
    /// Differs from the persisted mode (always true on first sighting)
    pub changed: bool,
}

/// Derives modes from display names.
pub struct ModeResolver<'a> {
    suffixes: &'a Suffixes,
    inbox: Option<Mode>,
}

impl<'a> ModeResolver<'a> {
    pub fn new(suffixes: &'a Suffixes, inbox: Option<Mode>) -> Self {
        ModeResolver { suffixes, inbox }
    }

    /// Mode encoded in a name alone.
    ///
    /// `Inbox` maps to the configured inbox mode. Otherwise the first
    /// suffix to match, in priority order, wins. Section names cannot hold
    /// `/`, so for sections every suffix is also tried with `/` spelled `_`.
    pub fn detect(&self, name: &str, kind: NameKind) -> Mode {
        let name = name.trim();
        if name == "Inbox" {
            return self.inbox.unwrap_or(Mode::None);
        }
        for (suffix, mode) in self.suffixes.in_priority() {
            if suffix.is_empty() {
                continue;
            }
            if name.ends_with(suffix) {
                return mode;
            }
            if kind == NameKind::Section && suffix.contains('/') {
                let alias = suffix.replace('/', "_");
                if name.ends_with(&alias) {
                    return mode;
                }
            }
        }
        Mode::None
    }

    /// Resolve a node's mode and record it in its persisted slot.
    ///
    /// A task without a suffix of its own takes the mode its parent pushed
    /// down this pass, if any. The slot is overwritten every time so the next
    /// cycle compares against the latest value.
    pub fn resolve_into(
        &self,
        name: &str,
        kind: NameKind,
        inherited: Option<Mode>,
        slot: &mut Option<Mode>,
    ) -> Resolution {
        let own = self.detect(name, kind);
        let mode = match inherited {
            Some(pushed) if kind == NameKind::Task && own.is_none() && !pushed.is_none() => pushed,
            _ => own,
        };
        let changed = *slot != Some(mode);
        *slot = Some(mode);
        Resolution { mode, changed }
    }
}
