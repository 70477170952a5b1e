//! Middlewares declaring the parameters a route needs.

use crate::error::{ParamError, Rejection};
use crate::middleware::Middleware;
use crate::params::{Conversion, Placement, Value};
use crate::request::RequestContext;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;

type Check = Box<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A mandatory parameter: extracted and converted before the handler runs.
///
/// Created by [`boolean`], [`integer`], [`float`], [`string`] and [`time`].
pub struct Declared {
    placement: Placement,
    name: String,
    conversion: Conversion,
    checks: Vec<Check>,
}

impl Declared {
    fn new(placement: Placement, name: impl Into<String>, conversion: Conversion) -> Self {
        Self { placement, name: name.into(), conversion, checks: Vec::new() }
    }

    /// Adds a validation run on the converted value; an `Err` rejects the request with 400.
    ///
    /// ```
    /// use micro_rest::params::{self, Placement, Value};
    ///
    /// let page = params::integer(Placement::Query, "page").check(|value| match value {
    ///     Value::Integer(page) if *page > 0 => Ok(()),
    ///     _ => Err("must be positive".to_owned()),
    /// });
    /// ```
    pub fn check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.checks.push(Box::new(check));
        self
    }

    #[inline]
    pub fn placement(&self) -> Placement {
        self.placement
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn conversion(&self) -> &Conversion {
        &self.conversion
    }
}

impl fmt::Debug for Declared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declared")
            .field("placement", &self.placement)
            .field("name", &self.name)
            .field("conversion", &self.conversion)
            .field("checks", &self.checks.len())
            .finish()
    }
}

#[async_trait]
impl Middleware for Declared {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Rejection> {
        let value = ctx.require(self.placement, &self.name, &self.conversion).await?;

        for check in &self.checks {
            check(value).map_err(|reason| ParamError::invalid(&self.name, reason))?;
        }

        Ok(())
    }

    fn path_capture(&self) -> Option<&str> {
        (self.placement == Placement::Path).then_some(self.name.as_str())
    }
}

/// Declares a mandatory boolean parameter.
pub fn boolean(placement: Placement, name: impl Into<String>) -> Declared {
    Declared::new(placement, name, Conversion::Bool)
}

/// Declares a mandatory 64-bit integer parameter.
pub fn integer(placement: Placement, name: impl Into<String>) -> Declared {
    Declared::new(placement, name, Conversion::Integer)
}

/// Declares a mandatory 64-bit float parameter.
pub fn float(placement: Placement, name: impl Into<String>) -> Declared {
    Declared::new(placement, name, Conversion::Float)
}

/// Declares a mandatory string parameter.
pub fn string(placement: Placement, name: impl Into<String>) -> Declared {
    Declared::new(placement, name, Conversion::String)
}

/// Declares a mandatory date-time parameter parsed with the strftime `layout`.
pub fn time(placement: Placement, name: impl Into<String>, layout: impl Into<String>) -> Declared {
    Declared::new(placement, name, Conversion::time(layout))
}

/// A mandatory request body bound to `T`, decoded according to the request `Content-Type`.
pub struct DeclaredBody<T> {
    _phantom: PhantomData<fn() -> T>,
}

/// Declares a mandatory body; the handler reads it with
/// [`RequestContext::declared_body`].
pub fn body<T>() -> DeclaredBody<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    DeclaredBody { _phantom: PhantomData }
}

impl<T> fmt::Debug for DeclaredBody<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeclaredBody").field("target", &std::any::type_name::<T>()).finish()
    }
}

#[async_trait]
impl<T> Middleware for DeclaredBody<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Rejection> {
        ctx.require_body::<T>().await?;
        Ok(())
    }
}

/// A validator reading a parameter already converted by an earlier declaration.
pub struct Validate {
    placement: Placement,
    name: String,
    check: Check,
}

/// Validates a parameter declared earlier in the chain, without converting it again.
///
/// The request is rejected with 500 if no earlier middleware declared the parameter.
pub fn validate<F>(placement: Placement, name: impl Into<String>, check: F) -> Validate
where
    F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
{
    Validate { placement, name: name.into(), check: Box::new(check) }
}

impl fmt::Debug for Validate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validate").field("placement", &self.placement).field("name", &self.name).finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for Validate {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<(), Rejection> {
        let value = ctx.declared_value(self.placement, &self.name)?;
        (self.check)(value).map_err(|reason| ParamError::invalid(&self.name, reason))?;
        Ok(())
    }
}
