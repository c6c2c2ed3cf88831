//! Authentication state traits and macro.

use crate::jwt::TokenCodec;

/// Trait for state types that can verify access tokens.
///
/// Only the codec is exposed: the access-token guard is a pure signature and
/// expiry check and never reads the credential store.
pub trait HasAuthBackend {
    fn codec(&self) -> &TokenCodec;
}

/// Macro to implement `HasAuthBackend` for state structs with the standard field.
///
/// The struct must have a `codec: Arc<TokenCodec>` field.
///
/// # Example
/// ```ignore
/// use crate::impl_has_auth_backend;
///
/// #[derive(Clone)]
/// pub struct MyState {
///     pub codec: Arc<TokenCodec>,
///     // ... other fields
/// }
///
/// impl_has_auth_backend!(MyState);
/// ```
#[macro_export]
macro_rules! impl_has_auth_backend {
    ($state_type:ty) => {
        impl $crate::auth::HasAuthBackend for $state_type {
            fn codec(&self) -> &$crate::jwt::TokenCodec {
                &self.codec
            }
        }
    };
}
