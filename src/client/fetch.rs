//! Fetch-mode bookkeeping for a statement proxy.

use super::entity::{Entity, EntityClass, SharedEntity};
use crate::error::UsageError;
use crate::types::FetchMode;
use crate::value::Value;

/// The extra argument of `Class` and `Into`.
#[derive(Debug, Clone)]
pub enum FetchArgument {
    Class(EntityClass),
    Instance(SharedEntity),
}

/// A fetch mode with its optional argument, as accepted by `query`.
#[derive(Debug, Clone)]
pub struct FetchModeSpec {
    pub mode: FetchMode,
    pub argument: Option<FetchArgument>,
    pub ctor_args: Option<Vec<Value>>,
}

impl FetchModeSpec {
    pub fn new(mode: FetchMode) -> Self {
        Self {
            mode,
            argument: None,
            ctor_args: None,
        }
    }

    pub fn class(class: EntityClass, ctor_args: Vec<Value>) -> Self {
        Self {
            mode: FetchMode::Class,
            argument: Some(FetchArgument::Class(class)),
            ctor_args: Some(ctor_args),
        }
    }

    pub fn into_instance(instance: SharedEntity) -> Self {
        Self {
            mode: FetchMode::Into,
            argument: Some(FetchArgument::Instance(instance)),
            ctor_args: None,
        }
    }
}

impl From<FetchMode> for FetchModeSpec {
    fn from(mode: FetchMode) -> Self {
        Self::new(mode)
    }
}

/// One fetched row.
#[derive(Debug)]
pub enum Fetched {
    /// A row shaped by the worker (`Assoc`, `Both`, `Named`, `Num`, `Obj`).
    Row(Value),
    /// A new instance built by `Class` or `fetch_object`.
    Entity(Box<dyn Entity>),
    /// The instance registered with `Into`, now populated.
    Into(SharedEntity),
}

impl Fetched {
    pub fn as_row(&self) -> Option<&Value> {
        match self {
            Fetched::Row(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_row(self) -> Option<Value> {
        match self {
            Fetched::Row(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_entity(self) -> Option<Box<dyn Entity>> {
        match self {
            Fetched::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn into_shared(self) -> Option<SharedEntity> {
        match self {
            Fetched::Into(entity) => Some(entity),
            _ => None,
        }
    }
}

/// How a single fetch is carried out.
#[derive(Debug, Clone)]
pub(crate) enum FetchPlan {
    /// One RPC; `None` lets the worker use its default mode.
    Remote(Option<FetchMode>),
    /// Fetch an associative row and build a new instance from it.
    Hydrate { class: EntityClass, ctor_args: Vec<Value> },
    /// Fetch an associative row and write it onto the stored instance.
    Populate(SharedEntity),
}

/// The statement's default fetch mode and its locally held argument.
///
/// None of this is sent to the worker.
#[derive(Debug, Clone, Default)]
pub struct FetchState {
    mode: Option<FetchMode>,
    argument: Option<FetchArgument>,
    ctor_args: Vec<Value>,
}

impl FetchState {
    pub fn mode(&self) -> Option<FetchMode> {
        self.mode
    }

    pub fn argument(&self) -> Option<&FetchArgument> {
        self.argument.as_ref()
    }

    /// Replace the default mode. On error the previous state is kept.
    pub fn set(
        &mut self,
        mode: FetchMode,
        argument: Option<FetchArgument>,
        ctor_args: Option<Vec<Value>>,
    ) -> Result<(), UsageError> {
        if mode.is_unsupported() {
            return Err(UsageError::UnsupportedFetchMode(mode));
        }

        let argument = match (mode, argument) {
            (FetchMode::Class, Some(argument @ FetchArgument::Class(_))) => Some(argument),
            (FetchMode::Class, _) => return Err(UsageError::InvalidFetchArgument(mode, "an entity class")),
            (FetchMode::Into, Some(argument @ FetchArgument::Instance(_))) => Some(argument),
            (FetchMode::Into, _) => return Err(UsageError::InvalidFetchArgument(mode, "an existing instance")),
            (_, Some(_)) => return Err(UsageError::InvalidFetchArgument(mode, "no extra argument")),
            (_, None) => None,
        };

        *self = Self {
            mode: Some(mode),
            argument,
            ctor_args: if mode == FetchMode::Class {
                ctor_args.unwrap_or_default()
            } else {
                Vec::new()
            },
        };
        Ok(())
    }

    /// Decide how to satisfy `fetch(requested)`.
    pub(crate) fn plan(&self, requested: Option<FetchMode>) -> Result<FetchPlan, UsageError> {
        let Some(mode) = requested.or(self.mode) else {
            return Ok(FetchPlan::Remote(None));
        };
        if mode.is_unsupported() {
            return Err(UsageError::UnsupportedFetchMode(mode));
        }

        match (mode, &self.argument) {
            (FetchMode::Class, Some(FetchArgument::Class(class))) if self.mode == Some(mode) => {
                Ok(FetchPlan::Hydrate {
                    class: class.clone(),
                    ctor_args: self.ctor_args.clone(),
                })
            }
            (FetchMode::Into, Some(FetchArgument::Instance(instance))) if self.mode == Some(mode) => {
                Ok(FetchPlan::Populate(instance.clone()))
            }
            (FetchMode::Class | FetchMode::Into, _) => Err(UsageError::DefaultModeRequired(mode)),
            (mode, _) => Ok(FetchPlan::Remote(Some(mode))),
        }
    }

    /// Decide how to satisfy `fetch_all(requested, argument, ctor_args)`.
    ///
    /// `Class` takes its class from `argument` when given, else from the
    /// default mode. `Into` has no multi-row form.
    pub(crate) fn plan_all(
        &self,
        requested: Option<FetchMode>,
        argument: Option<FetchArgument>,
        ctor_args: Option<Vec<Value>>,
    ) -> Result<FetchPlan, UsageError> {
        let Some(mode) = requested.or(self.mode) else {
            return Ok(FetchPlan::Remote(None));
        };
        if mode.is_unsupported() || mode == FetchMode::Into {
            return Err(UsageError::UnsupportedFetchMode(mode));
        }

        if mode != FetchMode::Class {
            return match argument {
                Some(_) => Err(UsageError::InvalidFetchArgument(mode, "no extra argument")),
                None => Ok(FetchPlan::Remote(Some(mode))),
            };
        }

        match argument {
            Some(FetchArgument::Class(class)) => Ok(FetchPlan::Hydrate {
                class,
                ctor_args: ctor_args.unwrap_or_default(),
            }),
            Some(FetchArgument::Instance(_)) => Err(UsageError::InvalidFetchArgument(mode, "an entity class")),
            None => match self.plan(Some(mode))? {
                FetchPlan::Hydrate { class, ctor_args: stored } => Ok(FetchPlan::Hydrate {
                    class,
                    ctor_args: ctor_args.unwrap_or(stored),
                }),
                _ => Err(UsageError::DefaultModeRequired(mode)),
            },
        }
    }
}
