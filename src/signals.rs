use std::fmt;
use std::sync::Mutex;

use crate::model::Instance;
use crate::value::Value;

/// A successful field assignment, as seen by observers.
#[derive(Debug)]
pub struct FieldChange<'a> {
    pub model: &'a str,
    pub field: &'a str,
    pub old: &'a Value,
    pub new: &'a Value,
}

type CreationHook = Box<dyn Fn(&Instance) + Send + Sync>;
type FieldUpdateHook = Box<dyn Fn(&FieldChange<'_>) + Send + Sync>;

/// Fire-and-forget observers attached to one schema.
///
/// Hooks run synchronously: creation hooks after an instance is
/// constructed, field-update hooks after each successful assignment.
/// Core invariants (dirty tracking, pk immutability) never depend on a
/// hook being attached.
#[derive(Default)]
pub struct SignalHub {
    creation: Mutex<Vec<CreationHook>>,
    field_update: Mutex<Vec<FieldUpdateHook>>,
}

impl SignalHub {
    pub fn on_creation(&self, hook: impl Fn(&Instance) + Send + Sync + 'static) {
        self.creation
            .lock()
            .expect("signal lock poisoned")
            .push(Box::new(hook));
    }

    pub fn on_field_update(&self, hook: impl Fn(&FieldChange<'_>) + Send + Sync + 'static) {
        self.field_update
            .lock()
            .expect("signal lock poisoned")
            .push(Box::new(hook));
    }

    pub(crate) fn notify_creation(&self, instance: &Instance) {
        for hook in self.creation.lock().expect("signal lock poisoned").iter() {
            hook(instance);
        }
    }

    pub(crate) fn notify_field_update(&self, change: &FieldChange<'_>) {
        for hook in self
            .field_update
            .lock()
            .expect("signal lock poisoned")
            .iter()
        {
            hook(change);
        }
    }
}

impl fmt::Debug for SignalHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalHub").finish_non_exhaustive()
    }
}
