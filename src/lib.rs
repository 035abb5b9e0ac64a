//! Renderless reactive form engine.
//!
//! Forms are declared with [`form::FormConfig`], driven through [`form::FormEngine`], and
//! observed through its selectors. Field properties may be computed from the live values of
//! every field and from resolved data sources; the engine recomputes them after each action.

pub mod form;
pub mod id;
pub mod prelude;

#[cfg(test)]
mod test_public_api;
