//! Command handlers.
//!
//! Synchronous and asynchronous handlers share one calling convention: each
//! invocation yields a [`HandlerFuture`]. Synchronous handlers run during the
//! call and hand back a ready future.

use std::fmt;
use std::future::{self, Future};
use std::pin::Pin;

use autocli_core::{Args, ArgsSchema, ParsedArgs};

use crate::{IntoOutcome, Outcome};

/// The future an invocation resolves through.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Outcome> + Send + 'static>>;

type Invoke<S> = dyn Fn(&mut S, ParsedArgs) -> HandlerFuture + Send + Sync;

/// A registered command operation over application state `S`.
///
/// # Examples
///
/// ```
/// use autocli_core::{Args, ArgsSchema, FieldSpec};
/// use autocli_dispatch::Handler;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct GreetArgs {
///     name: String,
/// }
///
/// impl Args for GreetArgs {
///     fn schema() -> ArgsSchema {
///         ArgsSchema::new("GreetArgs").with_field(FieldSpec::string("name").default("World"))
///     }
/// }
///
/// let greet = Handler::typed(|_state: &mut (), args: GreetArgs| {
///     println!("Hello, {}!", args.name);
/// });
/// assert_eq!(greet.annotation().map(|s| s.name.as_str()), Some("GreetArgs"));
///
/// let status = Handler::new(|_state: &mut (), _args| true).about("Show status");
/// assert!(status.annotation().is_none());
/// ```
pub struct Handler<S> {
    annotation: Option<ArgsSchema>,
    about: Option<String>,
    asynchronous: bool,
    invoke: Box<Invoke<S>>,
}

impl<S: 'static> Handler<S> {
    /// A synchronous handler receiving the untyped [`ParsedArgs`].
    pub fn new<F, R>(f: F) -> Self
    where
        F: Fn(&mut S, ParsedArgs) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        let invoke: Box<Invoke<S>> = Box::new(move |state: &mut S, args: ParsedArgs| {
            let outcome = f(state, args).into_outcome();
            Box::pin(future::ready(outcome)) as HandlerFuture
        });
        Self::from_parts(None, false, invoke)
    }

    /// A synchronous handler receiving a deserialized record `A`.
    ///
    /// `A::schema()` becomes the handler's annotation.
    pub fn typed<A, F, R>(f: F) -> Self
    where
        A: Args,
        F: Fn(&mut S, A) -> R + Send + Sync + 'static,
        R: IntoOutcome,
    {
        let invoke: Box<Invoke<S>> = Box::new(move |state: &mut S, args: ParsedArgs| {
            let outcome = match instantiate::<A>(&args) {
                Ok(record) => f(state, record).into_outcome(),
                Err(outcome) => outcome,
            };
            Box::pin(future::ready(outcome)) as HandlerFuture
        });
        Self::from_parts(Some(A::schema()), false, invoke)
    }

    /// An asynchronous handler receiving the untyped [`ParsedArgs`].
    ///
    /// The closure runs against the state synchronously and returns a future
    /// that owns whatever it needs; the dispatcher awaits it to completion.
    pub fn future<F, Fut, R>(f: F) -> Self
    where
        F: Fn(&mut S, ParsedArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome,
    {
        let invoke: Box<Invoke<S>> = Box::new(move |state: &mut S, args: ParsedArgs| {
            let pending = f(state, args);
            Box::pin(async move { pending.await.into_outcome() }) as HandlerFuture
        });
        Self::from_parts(None, true, invoke)
    }

    /// An asynchronous handler receiving a deserialized record `A`.
    pub fn typed_future<A, F, Fut, R>(f: F) -> Self
    where
        A: Args,
        F: Fn(&mut S, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
        R: IntoOutcome,
    {
        let invoke: Box<Invoke<S>> = Box::new(move |state: &mut S, args: ParsedArgs| {
            match instantiate::<A>(&args) {
                Ok(record) => {
                    let pending = f(state, record);
                    Box::pin(async move { pending.await.into_outcome() }) as HandlerFuture
                }
                Err(outcome) => Box::pin(future::ready(outcome)) as HandlerFuture,
            }
        });
        Self::from_parts(Some(A::schema()), true, invoke)
    }

    fn from_parts(annotation: Option<ArgsSchema>, asynchronous: bool, invoke: Box<Invoke<S>>) -> Self {
        Self {
            annotation,
            about: None,
            asynchronous,
            invoke,
        }
    }

    /// Attaches an explicit schema, taking priority over naming conventions.
    pub fn annotated(mut self, schema: ArgsSchema) -> Self {
        self.annotation = Some(schema);
        self
    }

    /// Sets the one-line description shown in help.
    pub fn about(mut self, text: impl Into<String>) -> Self {
        self.about = Some(text.into());
        self
    }

    pub fn annotation(&self) -> Option<&ArgsSchema> {
        self.annotation.as_ref()
    }

    pub fn description(&self) -> Option<&str> {
        self.about.as_deref()
    }

    pub fn is_async(&self) -> bool {
        self.asynchronous
    }

    /// Runs the synchronous part of the handler and returns its future.
    pub(crate) fn invoke(&self, state: &mut S, args: ParsedArgs) -> HandlerFuture {
        (self.invoke)(state, args)
    }
}

impl<S> fmt::Debug for Handler<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler")
            .field("annotation", &self.annotation.as_ref().map(|s| &s.name))
            .field("about", &self.about)
            .field("asynchronous", &self.asynchronous)
            .finish_non_exhaustive()
    }
}

fn instantiate<A: Args>(args: &ParsedArgs) -> Result<A, Outcome> {
    args.deserialize::<A>().map_err(|err| {
        Outcome::Internal(format!(
            "cannot build {} from parsed arguments: {err}",
            args.schema_name()
        ))
    })
}

#[cfg(test)]
mod tests {
    use autocli_core::{FieldSpec, RawArgs, RawValue, Validator};
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct CountArgs {
        count: i64,
    }

    impl Args for CountArgs {
        fn schema() -> ArgsSchema {
            ArgsSchema::new("CountArgs").with_field(FieldSpec::int("count").default(1))
        }
    }

    fn parsed(count: &str) -> ParsedArgs {
        let validator = Validator::compile(&CountArgs::schema()).unwrap();
        let mut raw = RawArgs::new();
        raw.insert("count".into(), RawValue::Single(count.into()));
        validator.instantiate(&raw, None).unwrap()
    }

    fn block_on(fut: HandlerFuture) -> Outcome {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }

    #[test]
    fn test_sync_handler_mutates_state() {
        let handler = Handler::new(|total: &mut i64, args: ParsedArgs| {
            *total += args.int("count").unwrap_or_default();
        });
        let mut total = 0;
        let outcome = block_on(handler.invoke(&mut total, parsed("5")));
        assert_eq!(outcome, Outcome::Success);
        assert_eq!(total, 5);
        assert!(!handler.is_async());
    }

    #[test]
    fn test_typed_handler() {
        let handler = Handler::typed(|_: &mut (), args: CountArgs| args.count as i32);
        assert_eq!(handler.annotation().unwrap().name, "CountArgs");
        assert_eq!(block_on(handler.invoke(&mut (), parsed("3"))), Outcome::ExitCode(3));
    }

    #[test]
    fn test_typed_handler_with_mismatched_record() {
        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct NameArgs {
            name: String,
        }
        impl Args for NameArgs {
            fn schema() -> ArgsSchema {
                ArgsSchema::new("NameArgs").with_field(FieldSpec::string("name"))
            }
        }

        let handler = Handler::typed(|_: &mut (), _args: NameArgs| ());
        assert!(matches!(
            block_on(handler.invoke(&mut (), parsed("3"))),
            Outcome::Internal(_)
        ));
    }

    #[test]
    fn test_future_handler() {
        let handler = Handler::future(|_: &mut (), args: ParsedArgs| async move {
            args.int("count") == Some(2)
        });
        assert!(handler.is_async());
        assert_eq!(block_on(handler.invoke(&mut (), parsed("2"))), Outcome::Success);
        assert_eq!(block_on(handler.invoke(&mut (), parsed("1"))), Outcome::Failure);
    }

    #[test]
    fn test_annotated_and_about() {
        let handler = Handler::new(|_: &mut (), _| ())
            .annotated(CountArgs::schema())
            .about("Count things");
        assert_eq!(handler.annotation().unwrap().name, "CountArgs");
        assert_eq!(handler.description(), Some("Count things"));
    }
}
