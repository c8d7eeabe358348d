//! Validation hook run on every bound value.
//!
//! The app holds one [`Validator`]: a function that receives the freshly bound
//! value as `&dyn Any` and either accepts it or returns the reason it is
//! invalid, which the binder turns into a `422`. The default accepts
//! everything.
//!
//! [`Registry`] dispatches on the value's concrete type, so rules can be
//! written against the real type, or derived with the `validator` crate:
//!
//! ```rust
//! use mango::validate::Registry;
//! use serde::Deserialize;
//! use validator::Validate;
//!
//! #[derive(Deserialize, Validate)]
//! struct Signup {
//!     #[validate(length(min = 3))]
//!     name: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct Page {
//!     size: u32,
//! }
//!
//! let registry = Registry::new()
//!     .derive::<Signup>()
//!     .rule::<Page>(|p| if p.size > 100 { Err("page too large".into()) } else { Ok(()) });
//!
//! let app = mango::App::builder()
//!     .validator(move |value| registry.validate(value))
//!     .build();
//! # drop(app);
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::BoxError;

/// The app-wide validation function.
pub type Validator = Arc<dyn Fn(&dyn Any) -> Result<(), BoxError> + Send + Sync + 'static>;

type Rule = Box<dyn Fn(&dyn Any) -> Result<(), BoxError> + Send + Sync + 'static>;

pub(crate) fn accept_all() -> Validator {
    Arc::new(|_: &dyn Any| Ok(()))
}

/// Per-type validation rules. Types without a rule pass.
#[derive(Default)]
pub struct Registry {
    rules: HashMap<TypeId, Rule>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }

    /// Adds (or replaces) the rule for `T`.
    pub fn rule<T: Any>(
        mut self,
        rule: impl Fn(&T) -> Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        let rule: Rule = Box::new(move |value: &dyn Any| match value.downcast_ref::<T>() {
            Some(value) => rule(value),
            None => Ok(()),
        });
        self.rules.insert(TypeId::of::<T>(), rule);
        self
    }

    /// Uses `T`'s `#[derive(Validate)]` rules.
    pub fn derive<T: validator::Validate + Any>(self) -> Self {
        self.rule::<T>(|value| value.validate().map_err(Into::into))
    }

    /// Runs the rule registered for the value's concrete type, if any.
    pub fn validate(&self, value: &dyn Any) -> Result<(), BoxError> {
        match self.rules.get(&(*value).type_id()) {
            Some(rule) => rule(value),
            None => Ok(()),
        }
    }

    pub fn into_validator(self) -> Validator {
        Arc::new(move |value: &dyn Any| self.validate(value))
    }
}
