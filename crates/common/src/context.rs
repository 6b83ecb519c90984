/// Error types that can be built from a plain message.
///
/// Crates implement this for their own `Error` and then invoke
/// [`impl_context!`](crate::impl_context) inside their error module.
pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;
}

/// Generate a crate-local `Context` trait that turns any displayable error
/// into the crate's `Error`, prefixed with a message.
///
/// The invoking module must define `Error: FromMessage` and
/// `type Result<T> = std::result::Result<T, Error>`.
///
/// ```ignore
/// // in crates/feishu/src/error.rs
/// moltis_common::impl_context!();
/// ```
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T> {
            /// Replace the error with `"{context}: {error}"`.
            fn context(self, context: &str) -> Result<T>;

            /// Like `context`, building the prefix only on error.
            fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, context: &str) -> Result<T> {
                self.with_context(|| context.to_string())
            }

            fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
                self.map_err(|e| {
                    <Error as $crate::FromMessage>::from_message(format!("{}: {e}", f()))
                })
            }
        }
    };
}
