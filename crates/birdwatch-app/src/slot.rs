use crate::remote::RemoteError;

/// Outcome of the most recent push of a [`Reconciled`] value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PushStatus {
    #[default]
    Never,
    Confirmed,
    Failed(String),
}

/// An operator-editable value held in two slots.
///
/// `local` is what the operator sees and edits; it is never rolled back.
/// `remote` is the last value the service is known to hold, kept for
/// diagnostics only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciled<T> {
    pub local: T,
    pub remote: Option<T>,
    pub last_push: PushStatus,
}

impl<T: Clone> Reconciled<T> {
    pub fn new(local: T) -> Self {
        Self {
            local,
            remote: None,
            last_push: PushStatus::Never,
        }
    }

    /// Adopt a value read from the service into both slots.
    pub fn adopt(&mut self, value: T) {
        self.remote = Some(value.clone());
        self.local = value;
    }

    pub fn record_push(&mut self, pushed: T, outcome: &Result<(), RemoteError>) {
        match outcome {
            Ok(()) => {
                self.remote = Some(pushed);
                self.last_push = PushStatus::Confirmed;
            }
            Err(err) => self.last_push = PushStatus::Failed(err.to_string()),
        }
    }
}

impl<T: PartialEq> Reconciled<T> {
    /// Whether the local value differs from what the service last confirmed.
    pub fn is_dirty(&self) -> bool {
        self.remote.as_ref() != Some(&self.local)
    }
}
