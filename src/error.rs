use std::future::Future;
use std::pin::Pin;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;
pub type DynFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type DynResultFuture<T> = DynFuture<'static, DynResult<T>>;
