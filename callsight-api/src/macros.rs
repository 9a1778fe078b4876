//! Router state plumbing.

/// Implement `FromRef<AppState>` for one field so handlers can take
/// `State<FieldType>` directly.
///
/// ```ignore
/// impl_from_ref!(DashboardService, dashboard);
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $field:ident) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$field.clone()
            }
        }
    };
}
