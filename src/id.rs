use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static AUTO_KEY_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormKey(Arc<str>);

impl FormKey {
    pub fn new(value: impl AsRef<str>) -> Self {
        Self(Arc::from(value.as_ref()))
    }

    /// Allocates a process-unique key for an ephemeral form.
    pub fn auto() -> Self {
        let next = AUTO_KEY_ALLOCATOR.fetch_add(1, Ordering::SeqCst);
        Self::new(format!("auto-{next}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for FormKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FormKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FormKey {
    fn from(value: String) -> Self {
        Self(Arc::from(value))
    }
}

pub fn field_id(form_key: &FormKey, name: &str) -> String {
    format!("{form_key}-{name}")
}
