//! Service registration and the call builder.
//!
//! A service is a set of statically typed invokers built once at registration time,
//! keyed by method name and generic arguments. Nothing is looked up by reflection
//! when a call arrives.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::de::{DeserializeOwned, Error as _};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::converter::ObjectConverter;
use crate::envelope::RemoteCall;
use crate::error::{Result, RpcError};
use crate::type_id::TypeIdentifier;
use crate::types::RemoteType;

/// Type-erased method body: decodes arguments, runs the handler and encodes the
/// return value. `Err` carries the text of the Error envelope.
pub(crate) type Invoker = Arc<
    dyn Fn(Arc<dyn ObjectConverter>, Vec<Bytes>) -> BoxFuture<'static, std::result::Result<Bytes, String>>
        + Send
        + Sync,
>;

/// An argument that could not be decoded into its parameter type.
#[derive(Debug, thiserror::Error)]
#[error("argument {index}: {source}")]
pub struct ArgumentError {
    pub index: usize,
    #[source]
    pub source: RpcError,
}

/// Parameter list of a method, as a tuple of argument types.
pub trait ArgList: Sized + Send + 'static {
    /// Number of parameters.
    const ARITY: usize;

    fn decode(
        converter: &dyn ObjectConverter,
        arguments: &[Bytes],
    ) -> std::result::Result<Self, ArgumentError>;
}

fn decode_argument<T: DeserializeOwned>(
    converter: &dyn ObjectConverter,
    arguments: &[Bytes],
    index: usize,
) -> std::result::Result<T, ArgumentError> {
    let raw = arguments.get(index).ok_or_else(|| ArgumentError {
        index,
        source: RpcError::Conversion(serde_json::Error::custom("missing argument")),
    })?;
    converter
        .deserialize(raw)
        .map_err(|source| ArgumentError { index, source })
}

macro_rules! impl_arg_list {
    ($arity:literal; $($name:ident : $index:tt),*) => {
        impl<$($name: DeserializeOwned + Send + 'static),*> ArgList for ($($name,)*) {
            const ARITY: usize = $arity;

            #[allow(unused_variables)]
            fn decode(
                converter: &dyn ObjectConverter,
                arguments: &[Bytes],
            ) -> std::result::Result<Self, ArgumentError> {
                Ok(($(decode_argument::<$name>(converter, arguments, $index)?,)*))
            }
        }
    };
}

impl_arg_list!(0;);
impl_arg_list!(1; A: 0);
impl_arg_list!(2; A: 0, B: 1);
impl_arg_list!(3; A: 0, B: 1, C: 2);
impl_arg_list!(4; A: 0, B: 1, C: 2, D: 3);
impl_arg_list!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
impl_arg_list!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

#[derive(Clone)]
pub(crate) struct MethodEntry {
    pub(crate) generic_arguments: Vec<TypeIdentifier>,
    pub(crate) arity: usize,
    pub(crate) invoker: Invoker,
}

/// A service implementation ready to be registered on a connection.
pub struct Service {
    interface: TypeIdentifier,
    methods: HashMap<String, Vec<MethodEntry>>,
}

impl Service {
    /// The interface this service implements.
    pub fn interface(&self) -> &TypeIdentifier {
        &self.interface
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Find the invoker for a call, or describe why there is none.
    pub(crate) fn resolve(
        &self,
        method: &str,
        generic_arguments: &[TypeIdentifier],
        argument_count: usize,
    ) -> std::result::Result<Invoker, String> {
        let entries = self.methods.get(method).ok_or_else(|| {
            format!(
                "Method '{method}' not found in interface '{}'.",
                self.interface
            )
        })?;

        let same_arity: Vec<&MethodEntry> = entries
            .iter()
            .filter(|entry| entry.generic_arguments.len() == generic_arguments.len())
            .collect();
        if same_arity.is_empty() {
            return Err(format!(
                "Generic argument count mismatch for method '{method}'."
            ));
        }

        let entry = same_arity
            .into_iter()
            .find(|entry| entry.generic_arguments == generic_arguments)
            .ok_or_else(|| {
                let requested: Vec<String> =
                    generic_arguments.iter().map(ToString::to_string).collect();
                format!(
                    "Method '{method}' is not available for generic arguments [{}].",
                    requested.join(", ")
                )
            })?;

        if entry.arity != argument_count {
            return Err(format!(
                "Parameter count mismatch for method '{method}' (expected {}, got {argument_count}).",
                entry.arity
            ));
        }
        Ok(Arc::clone(&entry.invoker))
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("interface", &self.interface.to_string())
            .field("methods", &self.method_names())
            .finish()
    }
}

/// Builds a [`Service`] from an implementation and its method handlers.
///
/// ```ignore
/// let service = ServiceBuilder::new(calculator_id(), Calculator)
///     .method("Add", |calc, (a, b): (i32, i32)| Ok::<_, Infallible>(calc.add(a, b)))
///     .async_method("Sum", |calc, (values,): (Vec<i32>,)| async move { calc.sum(values).await })
///     .generic_method("Echo", [String::type_identifier()], |_, (v,): (String,)| Ok::<_, Infallible>(v))
///     .build();
/// ```
///
/// Handlers return `Result<R, E>`; `Err(e)` is reported to the caller as
/// `e.to_string()`. A panic inside a handler is reported the same way. Registering
/// the same method name and generic arguments twice keeps the last handler.
pub struct ServiceBuilder<S> {
    interface: TypeIdentifier,
    service: Arc<S>,
    methods: HashMap<String, Vec<MethodEntry>>,
}

impl<S: Send + Sync + 'static> ServiceBuilder<S> {
    pub fn new(interface: TypeIdentifier, service: S) -> Self {
        Self::from_arc(interface, Arc::new(service))
    }

    /// Share an implementation that is also used elsewhere.
    pub fn from_arc(interface: TypeIdentifier, service: Arc<S>) -> Self {
        Self {
            interface,
            service,
            methods: HashMap::new(),
        }
    }

    /// Register a synchronous method.
    pub fn method<A, R, E, F>(self, name: &str, handler: F) -> Self
    where
        A: ArgList,
        R: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: Fn(&S, A) -> std::result::Result<R, E> + Send + Sync + 'static,
    {
        self.generic_method(name, [], handler)
    }

    /// Register a synchronous method for one set of generic arguments.
    pub fn generic_method<A, R, E, F>(
        mut self,
        name: &str,
        generic_arguments: impl IntoIterator<Item = TypeIdentifier>,
        handler: F,
    ) -> Self
    where
        A: ArgList,
        R: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: Fn(&S, A) -> std::result::Result<R, E> + Send + Sync + 'static,
    {
        let invoker = sync_invoker(Arc::clone(&self.service), name.to_string(), handler);
        self.insert(name, generic_arguments, A::ARITY, invoker);
        self
    }

    /// Register an asynchronous method. The handler receives a shared handle to the
    /// implementation so the returned future can outlive the call site.
    pub fn async_method<A, R, E, F, Fut>(self, name: &str, handler: F) -> Self
    where
        A: ArgList,
        R: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: Fn(Arc<S>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    {
        self.generic_async_method(name, [], handler)
    }

    /// Register an asynchronous method for one set of generic arguments.
    pub fn generic_async_method<A, R, E, F, Fut>(
        mut self,
        name: &str,
        generic_arguments: impl IntoIterator<Item = TypeIdentifier>,
        handler: F,
    ) -> Self
    where
        A: ArgList,
        R: Serialize + Send + 'static,
        E: Display + Send + 'static,
        F: Fn(Arc<S>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    {
        let invoker = async_invoker(Arc::clone(&self.service), name.to_string(), handler);
        self.insert(name, generic_arguments, A::ARITY, invoker);
        self
    }

    pub fn build(self) -> Service {
        Service {
            interface: self.interface,
            methods: self.methods,
        }
    }

    fn insert(
        &mut self,
        name: &str,
        generic_arguments: impl IntoIterator<Item = TypeIdentifier>,
        arity: usize,
        invoker: Invoker,
    ) {
        let generic_arguments: Vec<TypeIdentifier> = generic_arguments.into_iter().collect();
        let entries = self.methods.entry(name.to_string()).or_default();
        entries.retain(|entry| entry.generic_arguments != generic_arguments);
        entries.push(MethodEntry {
            generic_arguments,
            arity,
            invoker,
        });
    }
}

fn sync_invoker<S, A, R, E, F>(service: Arc<S>, method: String, handler: F) -> Invoker
where
    S: Send + Sync + 'static,
    A: ArgList,
    R: Serialize + Send + 'static,
    E: Display + Send + 'static,
    F: Fn(&S, A) -> std::result::Result<R, E> + Send + Sync + 'static,
{
    let handler = Arc::new(handler);
    Arc::new(move |converter: Arc<dyn ObjectConverter>, arguments: Vec<Bytes>| {
        let service = Arc::clone(&service);
        let handler = Arc::clone(&handler);
        let method = method.clone();
        async move {
            let args =
                A::decode(&*converter, &arguments).map_err(|err| argument_failure(&method, &err))?;
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| handler(service.as_ref(), args)))
                .map_err(|panic| panic_failure(&method, panic.as_ref()))?;
            let value = outcome.map_err(|err| err.to_string())?;
            converter
                .serialize_return(&value)
                .map_err(|err| result_failure(&method, &err))
        }
        .boxed()
    })
}

fn async_invoker<S, A, R, E, F, Fut>(service: Arc<S>, method: String, handler: F) -> Invoker
where
    S: Send + Sync + 'static,
    A: ArgList,
    R: Serialize + Send + 'static,
    E: Display + Send + 'static,
    F: Fn(Arc<S>, A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
{
    let handler = Arc::new(handler);
    Arc::new(move |converter: Arc<dyn ObjectConverter>, arguments: Vec<Bytes>| {
        let service = Arc::clone(&service);
        let handler = Arc::clone(&handler);
        let method = method.clone();
        async move {
            let args =
                A::decode(&*converter, &arguments).map_err(|err| argument_failure(&method, &err))?;
            let pending = std::panic::catch_unwind(AssertUnwindSafe(|| handler(service, args)))
                .map_err(|panic| panic_failure(&method, panic.as_ref()))?;
            let outcome = AssertUnwindSafe(pending)
                .catch_unwind()
                .await
                .map_err(|panic| panic_failure(&method, panic.as_ref()))?;
            let value = outcome.map_err(|err| err.to_string())?;
            converter
                .serialize_return(&value)
                .map_err(|err| result_failure(&method, &err))
        }
        .boxed()
    })
}

fn argument_failure(method: &str, err: &ArgumentError) -> String {
    format!(
        "Failed to deserialize argument {} of method '{method}': {}",
        err.index, err.source
    )
}

fn result_failure(method: &str, err: &RpcError) -> String {
    format!("Failed to serialize the result of method '{method}': {err}")
}

fn panic_failure(method: &str, payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic");
    format!("Method '{method}' panicked: {detail}")
}

/// A call as assembled by a proxy, before it is bound to a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub interface: TypeIdentifier,
    pub method: String,
    pub arguments: Vec<Value>,
    pub generic_arguments: Vec<TypeIdentifier>,
}

impl CallRequest {
    /// Start building a call of `method` on `interface`.
    pub fn builder(interface: TypeIdentifier, method: impl Into<String>) -> CallBuilder {
        CallBuilder {
            request: CallRequest {
                interface,
                method: method.into(),
                arguments: Vec::new(),
                generic_arguments: Vec::new(),
            },
            error: None,
        }
    }

    /// Serialize the arguments with `converter`. The correlation id is left nil and
    /// assigned when the call is issued.
    pub fn into_remote_call(self, converter: &dyn ObjectConverter) -> Result<RemoteCall> {
        let arguments = self
            .arguments
            .iter()
            .map(|argument| converter.encode(argument).map(Bytes::from))
            .collect::<Result<Vec<_>>>()?;
        Ok(RemoteCall {
            id: Uuid::nil(),
            interface: self.interface,
            method: self.method,
            arguments,
            generic_arguments: self.generic_arguments,
        })
    }
}

/// Builder returned by [`CallRequest::builder`].
#[derive(Debug)]
pub struct CallBuilder {
    request: CallRequest,
    error: Option<serde_json::Error>,
}

impl CallBuilder {
    /// Append the next argument.
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        if self.error.is_none() {
            match serde_json::to_value(value) {
                Ok(value) => self.request.arguments.push(value),
                Err(err) => self.error = Some(err),
            }
        }
        self
    }

    /// Append a generic argument.
    pub fn generic<T: RemoteType>(self) -> Self {
        self.generic_id(T::type_identifier())
    }

    /// Append a generic argument by identifier.
    pub fn generic_id(mut self, id: TypeIdentifier) -> Self {
        self.request.generic_arguments.push(id);
        self
    }

    /// Finish the call; fails if any argument could not be serialized.
    pub fn build(self) -> Result<CallRequest> {
        match self.error {
            Some(err) => Err(RpcError::Conversion(err)),
            None => Ok(self.request),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::converter::JsonConverter;

    struct Calculator;

    impl Calculator {
        fn add(&self, a: i32, b: i32) -> i32 {
            a + b
        }
    }

    fn calculator_id() -> TypeIdentifier {
        TypeIdentifier::new("tests", "tests.ICalculator")
    }

    fn converter() -> Arc<dyn ObjectConverter> {
        Arc::new(JsonConverter::new())
    }

    fn args(converter: &dyn ObjectConverter, values: &[Value]) -> Vec<Bytes> {
        values
            .iter()
            .map(|value| Bytes::from(converter.encode(value).unwrap()))
            .collect()
    }

    fn service() -> Service {
        ServiceBuilder::new(calculator_id(), Calculator)
            .method("Add", |calc, (a, b): (i32, i32)| {
                Ok::<_, Infallible>(calc.add(a, b))
            })
            .method("Nothing", |_, (): ()| Ok::<_, Infallible>(()))
            .method("Fail", |_, (): ()| Err::<i32, _>("ERROR"))
            .method("Panic", |_, (): ()| -> std::result::Result<i32, Infallible> {
                panic!("kaboom")
            })
            .async_method("Sum", |_, (values,): (Vec<i32>,)| async move {
                Ok::<_, Infallible>(values.iter().sum::<i32>())
            })
            .generic_method(
                "Echo",
                [String::type_identifier()],
                |_, (value,): (String,)| Ok::<_, Infallible>(value),
            )
            .generic_method(
                "Echo",
                [i32::type_identifier()],
                |_, (value,): (i32,)| Ok::<_, Infallible>(value * 10),
            )
            .build()
    }

    async fn invoke(
        service: &Service,
        method: &str,
        generics: &[TypeIdentifier],
        values: &[Value],
    ) -> std::result::Result<Bytes, String> {
        let converter = converter();
        let arguments = args(&*converter, values);
        let invoker = service.resolve(method, generics, arguments.len())?;
        invoker(converter, arguments).await
    }

    #[tokio::test]
    async fn test_sync_method() {
        let result = invoke(&service(), "Add", &[], &[4.into(), 5.into()]).await;
        assert_eq!(result.unwrap().as_ref(), b"9");
    }

    #[tokio::test]
    async fn test_async_method() {
        let result = invoke(&service(), "Sum", &[], &[serde_json::json!([1, 2, 3])]).await;
        assert_eq!(result.unwrap().as_ref(), b"6");
    }

    #[tokio::test]
    async fn test_void_method_returns_empty_payload() {
        let result = invoke(&service(), "Nothing", &[], &[]).await;
        assert!(result.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generic_overloads_selected_by_type() {
        let service = service();
        let text = invoke(&service, "Echo", &[String::type_identifier()], &["x".into()]).await;
        let number = invoke(&service, "Echo", &[i32::type_identifier()], &[5.into()]).await;
        assert_eq!(text.unwrap().as_ref(), b"\"x\"");
        assert_eq!(number.unwrap().as_ref(), b"50");
    }

    #[tokio::test]
    async fn test_handler_error_text_is_reported() {
        let err = invoke(&service(), "Fail", &[], &[]).await.unwrap_err();
        assert_eq!(err, "ERROR");
    }

    #[tokio::test]
    async fn test_panic_is_reported() {
        let err = invoke(&service(), "Panic", &[], &[]).await.unwrap_err();
        assert!(err.contains("kaboom"), "{err}");
    }

    #[tokio::test]
    async fn test_argument_type_mismatch() {
        let err = invoke(&service(), "Add", &[], &["four".into(), 5.into()])
            .await
            .unwrap_err();
        assert!(err.starts_with("Failed to deserialize argument 0"), "{err}");
    }

    #[test]
    fn test_resolution_failures() {
        let service = service();
        let unknown = service.resolve("Divide", &[], 2).err().unwrap();
        assert!(unknown.contains("Method 'Divide' not found"));

        let params = service.resolve("Add", &[], 3).err().unwrap();
        assert!(params.starts_with("Parameter count mismatch"));

        let generics = service.resolve("Add", &[i32::type_identifier()], 2).err().unwrap();
        assert!(generics.starts_with("Generic argument count mismatch"));

        let unresolved = service
            .resolve("Echo", &[bool::type_identifier()], 1)
            .err()
            .unwrap();
        assert!(unresolved.contains("std bool"));
    }

    #[test]
    fn test_reregistering_replaces_handler() {
        let service = ServiceBuilder::new(calculator_id(), Calculator)
            .method("Add", |_, (_a, _b): (i32, i32)| Ok::<_, Infallible>(0))
            .method("Add", |_, (a,): (i32,)| Ok::<_, Infallible>(a))
            .build();
        assert!(service.resolve("Add", &[], 1).is_ok());
        assert!(service.resolve("Add", &[], 2).is_err());
        assert_eq!(service.method_names(), vec!["Add"]);
    }

    #[test]
    fn test_call_builder() {
        let request = CallRequest::builder(calculator_id(), "Echo")
            .arg("x")
            .generic::<String>()
            .build()
            .unwrap();
        assert_eq!(request.arguments, vec![Value::from("x")]);
        assert_eq!(request.generic_arguments, vec![String::type_identifier()]);

        let call = request.into_remote_call(&JsonConverter::new()).unwrap();
        assert_eq!(call.arguments, vec![Bytes::from_static(b"\"x\"")]);
        assert!(call.id.is_nil());
    }
}
