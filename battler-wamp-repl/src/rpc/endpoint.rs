use std::sync::Arc;

use anyhow::{
    Error,
    Result,
};

use crate::{
    backend::InvocationHandler,
    core::arguments::Arguments,
};

/// A synchronous procedure endpoint.
pub type SyncEndpoint = dyn Fn(&Arguments) -> Result<Arguments> + Send + Sync;

/// The implementation behind a registered procedure.
#[derive(Clone, Default)]
pub enum Endpoint {
    /// Returns nothing.
    #[default]
    None,
    Sync(Arc<SyncEndpoint>),
    Async(Arc<dyn InvocationHandler>),
}

impl Endpoint {
    /// Creates a synchronous endpoint.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&Arguments) -> Result<Arguments> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Creates an asynchronous endpoint.
    pub fn from_handler<H>(handler: H) -> Self
    where
        H: InvocationHandler + 'static,
    {
        Self::Async(Arc::new(handler))
    }

    /// An endpoint that returns its arguments.
    pub fn echo() -> Self {
        Self::sync(|arguments| Ok(arguments.clone()))
    }

    /// An endpoint that always returns the same values.
    pub fn constant(result: Arguments) -> Self {
        Self::sync(move |_| Ok(result.clone()))
    }

    /// An endpoint that always fails with the same message.
    pub fn failing<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        let message = message.into();
        Self::sync(move |_| Err(Error::msg(message.clone())))
    }

    pub(crate) async fn invoke(&self, arguments: Arguments) -> Result<Arguments> {
        match self {
            Self::None => Ok(Arguments::default()),
            Self::Sync(endpoint) => endpoint(&arguments),
            Self::Async(handler) => handler.invoke(arguments).await,
        }
    }

    /// A short description of the endpoint.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Sync(_) => "sync",
            Self::Async(_) => "async",
        }
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Endpoint({})", self.kind())
    }
}

#[cfg(test)]
mod endpoint_test {
    use anyhow::Result;
    use async_trait::async_trait;
    use battler_wamp_values::Value;

    use crate::{
        backend::InvocationHandler,
        core::arguments::Arguments,
        rpc::Endpoint,
    };

    struct Doubler;

    #[async_trait]
    impl InvocationHandler for Doubler {
        async fn invoke(&self, arguments: Arguments) -> Result<Arguments> {
            Ok(Arguments::positional(
                arguments
                    .arguments
                    .iter()
                    .filter_map(|value| value.integer())
                    .map(|value| Value::Integer(value * 2)),
            ))
        }
    }

    #[tokio::test]
    async fn invokes_each_kind() {
        let arguments = Arguments::positional([Value::Integer(2)]);
        assert_eq!(
            Endpoint::None.invoke(arguments.clone()).await.unwrap(),
            Arguments::default()
        );
        assert_eq!(
            Endpoint::echo().invoke(arguments.clone()).await.unwrap(),
            arguments
        );
        assert_eq!(
            Endpoint::from_handler(Doubler)
                .invoke(arguments.clone())
                .await
                .unwrap(),
            Arguments::positional([Value::Integer(4)])
        );
        assert_matches::assert_matches!(Endpoint::failing("nope").invoke(arguments).await, Err(err) => {
            assert_eq!(err.to_string(), "nope");
        });
    }
}
