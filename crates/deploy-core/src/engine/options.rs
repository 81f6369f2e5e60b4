use std::collections::BTreeSet;
use std::time::Duration;

/// Re-ejecución explícita de steps ya `Succeeded`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ForcePolicy {
    #[default]
    None,
    Steps(BTreeSet<usize>),
    All,
}

impl ForcePolicy {
    pub fn includes(&self, ordinal: usize) -> bool {
        match self {
            Self::None => false,
            Self::Steps(set) => set.contains(&ordinal),
            Self::All => true,
        }
    }
}

/// Opciones de una ejecución de `MigrationRunner::run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Steps con ordinal menor no se ejecutan (se reportan `NotSelected`).
    pub start_from: Option<usize>,
    pub force: ForcePolicy,
    /// Límite por step (deploy y post-action por separado). Al expirar, el
    /// resultado queda `Unknown` y la ejecución se detiene.
    pub step_timeout: Option<Duration>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(mut self, ordinal: usize) -> Self {
        self.start_from = Some(ordinal);
        self
    }

    pub fn forcing(mut self, ordinals: impl IntoIterator<Item = usize>) -> Self {
        self.force = ForcePolicy::Steps(ordinals.into_iter().collect());
        self
    }

    pub fn force_all(mut self) -> Self {
        self.force = ForcePolicy::All;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn selects(&self, ordinal: usize) -> bool {
        self.start_from.map_or(true, |from| ordinal >= from)
    }
}
