use super::{LookupResult, ResponseHandler};
use crate::errors::AppResult;

/// Wraps a plain parse function as a handler. The URL comes from the run's
/// template and is built with the default query encoding.
pub struct FnHandler<F> {
    name: String,
    parse: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&str, &str) -> AppResult<LookupResult> + Send + Sync,
{
    pub fn new(name: impl Into<String>, parse: F) -> Self {
        Self {
            name: name.into(),
            parse,
        }
    }
}

impl<F> ResponseHandler for FnHandler<F>
where
    F: Fn(&str, &str) -> AppResult<LookupResult> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn parse(&self, body: &str, address: &str) -> AppResult<LookupResult> {
        (self.parse)(body, address)
    }
}
