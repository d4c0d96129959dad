//! Request lifecycle state for screens that load from the backend.
//!
//! Every backend call a screen makes is tracked as a [`RequestState`], moved
//! along by [`Lifecycle`] actions through the pure [`reduce`] function.
//! [`Resource`] wraps one state slot and drives it from a future. The stores
//! group the slots a screen needs and re-fetch after each mutation.

mod appointments;
mod pharmacy;
mod prescriptions;

pub use appointments::AppointmentStore;
pub use pharmacy::PharmacyStore;
pub use prescriptions::PrescriptionStore;

use std::future::Future;

use crate::api::ApiResult;

/// Where a request stands.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestState<T> {
    Idle,
    /// In flight; keeps the last good value so screens can show it meanwhile
    Loading { previous: Option<T> },
    Success(T),
    Failure(String),
}

impl<T> RequestState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, RequestState::Loading { .. })
    }

    /// Current value, or the previous one while reloading.
    pub fn data(&self) -> Option<&T> {
        match self {
            RequestState::Success(value) => Some(value),
            RequestState::Loading { previous } => previous.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RequestState::Failure(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lifecycle<T> {
    Request,
    Success(T),
    Fail(String),
    ClearErrors,
}

pub fn reduce<T>(state: RequestState<T>, action: Lifecycle<T>) -> RequestState<T> {
    match action {
        Lifecycle::Request => match state {
            RequestState::Success(value) => RequestState::Loading {
                previous: Some(value),
            },
            loading @ RequestState::Loading { .. } => loading,
            RequestState::Idle | RequestState::Failure(_) => RequestState::Loading { previous: None },
        },
        Lifecycle::Success(value) => RequestState::Success(value),
        Lifecycle::Fail(message) => RequestState::Failure(message),
        Lifecycle::ClearErrors => match state {
            RequestState::Failure(_) => RequestState::Idle,
            other => other,
        },
    }
}

/// One state slot driven by backend calls.
#[derive(Debug, Clone)]
pub struct Resource<T> {
    state: RequestState<T>,
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Self {
            state: RequestState::Idle,
        }
    }
}

impl<T> Resource<T> {
    pub fn state(&self) -> &RequestState<T> {
        &self.state
    }

    pub fn data(&self) -> Option<&T> {
        self.state.data()
    }

    pub fn apply(&mut self, action: Lifecycle<T>) {
        let state = std::mem::replace(&mut self.state, RequestState::Idle);
        self.state = reduce(state, action);
    }

    pub fn clear_errors(&mut self) {
        self.apply(Lifecycle::ClearErrors);
    }

    /// Run `request`, recording request, success and failure. The error is
    /// stored as its message and also handed back to the caller.
    pub async fn dispatch<F>(&mut self, request: F) -> ApiResult<()>
    where
        F: Future<Output = ApiResult<T>>,
    {
        self.apply(Lifecycle::Request);
        match request.await {
            Ok(value) => {
                self.apply(Lifecycle::Success(value));
                Ok(())
            }
            Err(e) => {
                self.apply(Lifecycle::Fail(e.to_string()));
                Err(e)
            }
        }
    }
}
